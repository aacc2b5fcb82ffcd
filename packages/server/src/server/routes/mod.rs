// HTTP routes
pub mod health;
pub mod likes;
pub mod posts;

pub use health::*;
pub use likes::*;
pub use posts::*;
