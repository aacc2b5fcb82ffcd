// Post Service - API Core
//
// Post CRUD plus the asynchronous like/unlike pipeline: HTTP accepts an
// intent, JetStream carries it, partition consumers apply it exactly once
// against Postgres.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
