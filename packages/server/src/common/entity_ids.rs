//! Typed ID definitions for the entities this service knows about.

pub use super::id::{Id, V4, V7};

/// Marker type for Post entities.
pub struct Post;

/// Marker type for users. Users live in another service; we only store their ids.
pub struct User;

/// Marker type for PostLike rows (the user-likes-post relationship).
pub struct PostLike;

/// Marker type for like/unlike events carried over the broker.
pub struct LikeEvent;

pub type PostId = Id<Post>;

pub type UserId = Id<User, V4>;

pub type PostLikeId = Id<PostLike>;

pub type LikeEventId = Id<LikeEvent>;

/// Media uploads are owned by the media service.
pub struct MediaFile;

pub type MediaFileId = Id<MediaFile, V4>;
