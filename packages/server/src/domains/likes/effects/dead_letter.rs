//! Dead-letter sink for like events that cannot be applied.
//!
//! A dead letter keeps the original subject and raw payload, so an operator
//! can inspect it and republish it once the cause is fixed.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::common::nats_tap::publish_event;
use crate::common::IntoNatsPayload;
use crate::domains::likes::events::fnv1a;
use crate::kernel::streams::DEAD_LETTER_SUBJECT;
use crate::kernel::NatsPublisher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub subject: String,
    /// Original message body, lossy if it was not UTF-8.
    pub payload: String,
    pub reason: String,
    pub deliveries: u64,
    pub stream_sequence: u64,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        subject: &str,
        payload: &[u8],
        reason: impl Into<String>,
        deliveries: u64,
        stream_sequence: u64,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            reason: reason.into(),
            deliveries,
            stream_sequence,
            dead_lettered_at: Utc::now(),
        }
    }
}

impl IntoNatsPayload for DeadLetter {
    fn subject(&self) -> String {
        DEAD_LETTER_SUBJECT.to_string()
    }

    /// Same source message, same id: dead-lettering it twice is deduplicated.
    /// Without a stream sequence the payload identifies the message.
    fn message_id(&self) -> String {
        if self.stream_sequence == 0 {
            format!("{}#{:016x}", self.subject, fnv1a(&self.payload))
        } else {
            format!("{}#{}", self.subject, self.stream_sequence)
        }
    }

    fn into_payload(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, letter: DeadLetter) -> Result<()>;
}

/// Publishes dead letters to the `POST_LIKES_DLQ` stream.
pub struct NatsDeadLetterSink {
    nats: Arc<dyn NatsPublisher>,
}

impl NatsDeadLetterSink {
    pub fn new(nats: Arc<dyn NatsPublisher>) -> Self {
        Self { nats }
    }
}

#[async_trait]
impl DeadLetterSink for NatsDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        warn!(
            subject = %letter.subject,
            deliveries = letter.deliveries,
            stream_sequence = letter.stream_sequence,
            reason = %letter.reason,
            "dead-lettering like event"
        );
        publish_event(&letter, &*self.nats).await
    }
}
