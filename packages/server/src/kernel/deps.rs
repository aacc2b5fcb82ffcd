//! Server dependencies shared by actions and effects.
//!
//! Everything external is behind a trait or a pool so tests can swap in
//! [`TestNats`](crate::kernel::TestNats) and a testcontainers database.

use sqlx::PgPool;
use std::sync::Arc;

use crate::kernel::NatsPublisher;

/// Dependencies accessible to actions, constructed once at startup.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    /// Broker publisher (JetStream in production).
    pub nats: Arc<dyn NatsPublisher>,
    /// Number of like partitions; producers and consumers must agree on it.
    pub like_partitions: u32,
}

impl ServerDeps {
    pub fn new(db_pool: PgPool, nats: Arc<dyn NatsPublisher>, like_partitions: u32) -> Self {
        Self {
            db_pool,
            nats,
            like_partitions: like_partitions.max(1),
        }
    }
}
