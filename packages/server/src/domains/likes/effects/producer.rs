use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::common::nats_tap::publish_event;
use crate::common::{IntoNatsPayload, PostId, UserId};
use crate::domains::likes::events::{LikeEnvelope, LikeEventKind};
use crate::kernel::{NatsPublisher, ServerDeps};

/// Turns an accepted intent into a published envelope.
///
/// Waits for the broker's receipt and nothing more. Never touches the
/// database.
#[derive(Clone)]
pub struct LikeEventProducer {
    nats: Arc<dyn NatsPublisher>,
    partitions: u32,
}

impl LikeEventProducer {
    pub fn new(nats: Arc<dyn NatsPublisher>, partitions: u32) -> Self {
        Self {
            nats,
            partitions: partitions.max(1),
        }
    }

    pub fn from_deps(deps: &ServerDeps) -> Self {
        Self::new(deps.nats.clone(), deps.like_partitions)
    }

    /// Publish a new intent. The returned envelope carries the event id the
    /// client can later look up in the ledger.
    pub async fn publish(&self, kind: LikeEventKind, post_id: PostId, user_id: UserId) -> Result<LikeEnvelope> {
        let envelope = LikeEnvelope::new(kind, post_id, user_id, self.partitions);

        publish_event(&envelope, &*self.nats).await?;

        info!(
            event_id = %envelope.event_id,
            kind = %kind,
            post_id = %post_id,
            user_id = %user_id,
            subject = %envelope.subject(),
            "like event published"
        );

        Ok(envelope)
    }
}
