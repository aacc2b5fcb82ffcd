//! Likes domain - asynchronous like/unlike pipeline
//!
//! The gateway validates and publishes intents; partition consumers apply
//! them through the reconciler, which consults the processed-event ledger so
//! every event id changes state at most once.

pub mod actions;
pub mod data;
pub mod effects;
pub mod events;
pub mod machines;
pub mod models;

pub use actions::LikeRequestError;
pub use data::{AcceptedLikeData, LikeRequestInput, LikeStatusData};
pub use events::{LikeEnvelope, LikeEventKind};
pub use models::{LedgerOutcome, PostLike, ProcessedEvent};
