pub mod post_like;
pub mod processed_event;

pub use post_like::*;
pub use processed_event::*;
