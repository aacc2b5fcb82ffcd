// Business domains
pub mod likes;
pub mod posts;
