//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod nats;
pub mod streams;

pub use deps::ServerDeps;
pub use nats::{JetStreamPublisher, NatsPublisher, PublishedMessage, TestNats};
pub use streams::ensure_streams;
