//! Partition consumers for the like stream.
//!
//! ```text
//! POST_LIKES ──► durable pull consumer per partition (max_ack_pending = 1)
//!                    │
//!                    ├─► read metadata ── unreadable ───────────► dead letter, term
//!                    ├─► decode envelope ── malformed ──────────► dead letter, term
//!                    ├─► Reconciler::apply
//!                    │       ├─ ok / already processed ─────────► ack
//!                    │       └─ error ─┬─ deliveries left ───────► nak(backoff)
//!                    │                 └─ exhausted ─────────────► dead letter, term
//!                    └─► next message
//! ```
//!
//! One unacknowledged message per partition keeps a pair's events in publish
//! order, also when several service instances share the durable consumers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer},
    AckKind,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::LikeConsumerConfig;
use crate::domains::likes::effects::dead_letter::{DeadLetter, DeadLetterSink};
use crate::domains::likes::effects::reconciler::{EnvelopeApplier, ReconcileOutcome};
use crate::domains::likes::events::{partition_subjects, LikeEnvelope};
use crate::kernel::streams::POST_LIKES_STREAM;

/// Bounded redelivery with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_deliveries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LikeConsumerConfig) -> Self {
        Self {
            max_deliveries: config.max_deliveries.max(1),
            base: config.retry_base,
            max: config.retry_max,
        }
    }

    /// Delay before the next delivery, after `delivered` attempts.
    pub fn backoff(&self, delivered: u64) -> Duration {
        let exponent = delivered.saturating_sub(1).min(20) as u32;
        self.base.saturating_mul(2u32.pow(exponent)).min(self.max)
    }

    pub fn exhausted(&self, delivered: u64) -> bool {
        delivered >= u64::from(self.max_deliveries)
    }
}

/// One delivery of one message, detached from the broker client.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subject: String,
    pub payload: Bytes,
    /// 1 on first delivery.
    pub delivered: u64,
    pub stream_sequence: u64,
}

impl Delivery {
    /// Fails when the reply subject carries no readable delivery metadata;
    /// such a message could never be counted towards exhaustion.
    pub fn from_message(message: &jetstream::Message) -> Result<Self, UnreadableDelivery> {
        match message.info() {
            Ok(info) => Ok(Self {
                subject: message.subject.to_string(),
                payload: message.payload.clone(),
                delivered: info.delivered.max(1) as u64,
                stream_sequence: info.stream_sequence,
            }),
            Err(e) => Err(UnreadableDelivery {
                subject: message.subject.to_string(),
                payload: message.payload.clone(),
                reason: format!("unreadable delivery metadata: {}", e),
            }),
        }
    }
}

/// A message whose delivery count and sequence are unknown.
#[derive(Debug, Clone)]
pub struct UnreadableDelivery {
    pub subject: String,
    pub payload: Bytes,
    pub reason: String,
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative-ack; the broker redelivers after the delay.
    Retry(Duration),
    /// Dead-lettered; the broker must never redeliver it.
    Terminate,
}

pub struct LikeEventHandler {
    applier: Arc<dyn EnvelopeApplier>,
    dead_letters: Arc<dyn DeadLetterSink>,
    policy: RetryPolicy,
}

impl LikeEventHandler {
    pub fn new(
        applier: Arc<dyn EnvelopeApplier>,
        dead_letters: Arc<dyn DeadLetterSink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            applier,
            dead_letters,
            policy,
        }
    }

    pub async fn handle(&self, delivery: &Delivery) -> Disposition {
        let envelope = match LikeEnvelope::decode(&delivery.subject, &delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(subject = %delivery.subject, error = %e, "malformed like event");
                return self.dead_letter_delivery(delivery, e.to_string()).await;
            }
        };

        match self.applier.apply(&envelope).await {
            Ok(ReconcileOutcome::Applied(_)) => Disposition::Ack,
            Ok(ReconcileOutcome::AlreadyProcessed) => {
                debug!(event_id = %envelope.event_id, deliveries = delivery.delivered, "redelivered like event skipped");
                Disposition::Ack
            }
            Err(e) if self.policy.exhausted(delivery.delivered) => {
                error!(
                    event_id = %envelope.event_id,
                    deliveries = delivery.delivered,
                    error = %e,
                    "like event failed on every delivery"
                );
                self.dead_letter_delivery(delivery, e.to_string()).await
            }
            Err(e) => {
                let delay = self.policy.backoff(delivery.delivered);
                warn!(
                    event_id = %envelope.event_id,
                    deliveries = delivery.delivered,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "like event failed, will retry"
                );
                Disposition::Retry(delay)
            }
        }
    }

    /// Dead-letter a message that cannot be counted or ordered.
    pub async fn reject(&self, unreadable: &UnreadableDelivery) -> Disposition {
        error!(subject = %unreadable.subject, reason = %unreadable.reason, "unreadable like delivery");
        let letter = DeadLetter::new(
            &unreadable.subject,
            &unreadable.payload,
            unreadable.reason.clone(),
            0,
            0,
        );
        self.dead_letter(letter, self.policy.base).await
    }

    async fn dead_letter_delivery(&self, delivery: &Delivery, reason: String) -> Disposition {
        let letter = DeadLetter::new(
            &delivery.subject,
            &delivery.payload,
            reason,
            delivery.delivered,
            delivery.stream_sequence,
        );
        self.dead_letter(letter, self.policy.backoff(delivery.delivered)).await
    }

    async fn dead_letter(&self, letter: DeadLetter, retry_in: Duration) -> Disposition {
        let subject = letter.subject.clone();
        match self.dead_letters.send(letter).await {
            Ok(()) => Disposition::Terminate,
            Err(e) => {
                // Keep the message on the stream until it can be parked.
                error!(subject = %subject, error = %e, "failed to dead-letter like event");
                Disposition::Retry(retry_in)
            }
        }
    }
}

/// A broker message the partition loop can read and settle.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    fn delivery(&self) -> Result<Delivery, UnreadableDelivery>;

    async fn settle(&self, disposition: Disposition) -> Result<(), async_nats::Error>;
}

#[async_trait]
impl InboundMessage for jetstream::Message {
    fn delivery(&self) -> Result<Delivery, UnreadableDelivery> {
        Delivery::from_message(self)
    }

    async fn settle(&self, disposition: Disposition) -> Result<(), async_nats::Error> {
        match disposition {
            Disposition::Ack => self.ack().await,
            Disposition::Retry(delay) => self.ack_with(AckKind::Nak(Some(delay))).await,
            Disposition::Terminate => self.ack_with(AckKind::Term).await,
        }
    }
}

/// Owns the durable consumers of every like partition.
pub struct LikeConsumerGroup {
    jetstream: jetstream::Context,
    handler: Arc<LikeEventHandler>,
    config: LikeConsumerConfig,
}

impl LikeConsumerGroup {
    pub fn new(jetstream: jetstream::Context, handler: Arc<LikeEventHandler>, config: LikeConsumerConfig) -> Self {
        Self {
            jetstream,
            handler,
            config,
        }
    }

    /// Create (or attach to) each partition's consumer and start its loop.
    ///
    /// Cancelling `shutdown` stops pulling; a transition already running
    /// finishes and is settled before its task returns.
    pub async fn spawn(self, shutdown: CancellationToken) -> Result<JoinSet<Result<()>>> {
        let stream = self
            .jetstream
            .get_stream(POST_LIKES_STREAM)
            .await
            .with_context(|| format!("stream {} not found", POST_LIKES_STREAM))?;

        let mut tasks = JoinSet::new();
        for partition in 0..self.config.partitions {
            let name = consumer_name(&self.config.consumer_group, partition);
            let consumer: PullConsumer = stream
                .get_or_create_consumer(&name, consumer_config(&self.config, partition))
                .await
                .with_context(|| format!("failed to create consumer {}", name))?;

            tasks.spawn(run_partition(
                partition,
                consumer,
                self.handler.clone(),
                shutdown.clone(),
            ));
        }

        info!(
            partitions = self.config.partitions,
            group = %self.config.consumer_group,
            "like consumers started"
        );
        Ok(tasks)
    }
}

pub fn consumer_name(group: &str, partition: u32) -> String {
    format!("{}-p{}", group, partition)
}

pub fn consumer_config(config: &LikeConsumerConfig, partition: u32) -> pull::Config {
    pull::Config {
        durable_name: Some(consumer_name(&config.consumer_group, partition)),
        filter_subjects: partition_subjects(partition),
        deliver_policy: DeliverPolicy::All,
        ack_policy: AckPolicy::Explicit,
        ack_wait: config.ack_wait,
        max_ack_pending: 1,
        ..Default::default()
    }
}

async fn run_partition(
    partition: u32,
    consumer: PullConsumer,
    handler: Arc<LikeEventHandler>,
    shutdown: CancellationToken,
) -> Result<()> {
    let messages = consumer
        .messages()
        .await
        .with_context(|| format!("failed to pull partition {}", partition))?;

    consume(partition, messages, &handler, &shutdown).await;

    info!(partition, "like consumer stopped");
    Ok(())
}

/// Handle and settle messages one at a time until the stream ends or
/// `shutdown` fires. A message already being handled is always settled.
async fn consume<S, M, E>(
    partition: u32,
    mut messages: S,
    handler: &LikeEventHandler,
    shutdown: &CancellationToken,
) where
    S: Stream<Item = std::result::Result<M, E>> + Unpin,
    M: InboundMessage,
    E: std::fmt::Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = messages.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(partition, error = %e, "like consumer pull error");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
                }
            }
            None => break,
        };

        let (subject, disposition) = match message.delivery() {
            Ok(delivery) => (delivery.subject.clone(), handler.handle(&delivery).await),
            Err(unreadable) => (unreadable.subject.clone(), handler.reject(&unreadable).await),
        };

        if let Err(e) = message.settle(disposition).await {
            // Unsettled messages come back after ack_wait; the ledger absorbs them.
            warn!(partition, subject = %subject, error = %e, "failed to settle like event");
        }
    }
}
