pub mod actions;
pub mod data;
pub mod events;
pub mod models;

pub use actions::PostActionError;
pub use data::{CreatePostInput, UpdatePostInput, ValidationError};
pub use events::{PostEvent, PostEventType};
pub use models::{Post, UpdatePost};
