//! Publishing helpers on top of [`NatsPublisher`].
//!
//! ```ignore
//! use crate::common::nats_tap::{publish_event, publish_best_effort};
//!
//! // Caller needs to know about failure (like/unlike intents)
//! publish_event(&envelope, &*deps.nats).await?;
//!
//! // State already committed, failure only gets logged (post lifecycle)
//! publish_best_effort(&event, &*deps.nats).await;
//! ```

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::common::nats::IntoNatsPayload;
use crate::kernel::nats::NatsPublisher;

/// Publish an event and wait for the broker to acknowledge it.
///
/// Errors (encoding, connection, missing stream, ack timeout) are returned to
/// the caller unchanged in meaning; nothing is retried here.
pub async fn publish_event<E: IntoNatsPayload>(event: &E, nats: &dyn NatsPublisher) -> Result<()> {
    let subject = event.subject();
    let message_id = event.message_id();
    let payload = event
        .into_payload()
        .with_context(|| format!("failed to encode payload for {}", subject))?;

    debug!(subject = %subject, message_id = %message_id, "publishing NATS event");

    nats.publish(subject.clone(), message_id, payload)
        .await
        .with_context(|| format!("failed to publish to {}", subject))
}

/// Publish an event, logging instead of failing.
///
/// Use only after the state the event describes has been committed.
pub async fn publish_best_effort<E: IntoNatsPayload>(event: &E, nats: &dyn NatsPublisher) {
    if let Err(e) = publish_event(event, nats).await {
        warn!(
            error = %e,
            subject = %event.subject(),
            "Failed to publish NATS event"
        );
    }
}
