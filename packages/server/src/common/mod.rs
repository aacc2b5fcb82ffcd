// Common types and utilities shared across the application

pub mod entity_ids;
pub mod id;
pub mod nats;
pub mod nats_tap;
pub mod pagination;

pub use entity_ids::*;
pub use id::{Id, V4, V7};
pub use nats::IntoNatsPayload;
pub use pagination::{Page, PageInfo, PageParams};
