//! NATS client abstraction for production and testing.
//!
//! Production publishes through JetStream and waits for the stream's ack;
//! tests use [`TestNats`], which records what would have been published and
//! can be switched into a failing mode to simulate broker outages.

use anyhow::{anyhow, Context, Result};
use async_nats::header::NATS_MESSAGE_ID;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub message_id: String,
    pub payload: Bytes,
}

/// Trait for NATS publish operations.
///
/// `publish` returns once the broker has durably accepted the message (or
/// failed to). It never waits for any consumer.
#[async_trait]
pub trait NatsPublisher: Send + Sync {
    async fn publish(&self, subject: String, message_id: String, payload: Bytes) -> Result<()>;
}

/// JetStream publisher.
pub struct JetStreamPublisher {
    context: jetstream::Context,
}

impl JetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl NatsPublisher for JetStreamPublisher {
    async fn publish(&self, subject: String, message_id: String, payload: Bytes) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(NATS_MESSAGE_ID, message_id.as_str());

        let ack = self
            .context
            .publish_with_headers(subject.clone(), headers, payload)
            .await
            .with_context(|| format!("publish to {} rejected", subject))?;
        let ack = ack
            .await
            .with_context(|| format!("no stream ack for {}", subject))?;

        if ack.duplicate {
            tracing::debug!(subject = %subject, message_id = %message_id, "broker dropped duplicate publish");
        }

        Ok(())
    }
}

/// Mock NATS client that tracks published messages for testing.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
    failing: AtomicBool,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every publish fails, as if the broker were down.
    pub fn failing() -> Self {
        let nats = Self::default();
        nats.set_failing(true);
        nats
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn record_publish(&self, subject: String, message_id: String, payload: Bytes) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                subject,
                message_id,
                payload,
            });
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    pub fn messages_with_prefix(&self, prefix: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn was_published_to(&self, subject: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.subject == subject)
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn messages_by_subject(&self) -> HashMap<String, Vec<PublishedMessage>> {
        let messages = self.published.read().unwrap_or_else(|e| e.into_inner());
        let mut by_subject: HashMap<String, Vec<PublishedMessage>> = HashMap::new();

        for msg in messages.iter() {
            by_subject
                .entry(msg.subject.clone())
                .or_default()
                .push(msg.clone());
        }

        by_subject
    }

    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl NatsPublisher for TestNats {
    async fn publish(&self, subject: String, message_id: String, payload: Bytes) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("nats unavailable (test)"));
        }
        self.record_publish(subject, message_id, payload);
        Ok(())
    }
}
