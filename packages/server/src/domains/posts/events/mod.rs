use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{IntoNatsPayload, PostId, UserId};
use crate::domains::posts::models::Post;
use crate::kernel::streams::POST_EVENTS_SUBJECT_PREFIX;

pub const POST_EVENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostEventType {
    PostCreated,
    PostUpdated,
    PostDeleted,
}

impl PostEventType {
    fn subject_suffix(self) -> &'static str {
        match self {
            PostEventType::PostCreated => "created",
            PostEventType::PostUpdated => "updated",
            PostEventType::PostDeleted => "deleted",
        }
    }
}

/// Post lifecycle fact, published after the change is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEvent {
    pub event_id: Uuid,
    pub event_type: PostEventType,
    pub post_id: PostId,
    pub user_id: UserId,
    /// Snapshot of the post as committed (as it was, for deletions).
    pub data: Post,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl PostEvent {
    pub fn new(event_type: PostEventType, post: &Post) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            post_id: post.id,
            user_id: post.user_id,
            data: post.clone(),
            timestamp: Utc::now(),
            version: POST_EVENT_VERSION.to_string(),
        }
    }

    pub fn created(post: &Post) -> Self {
        Self::new(PostEventType::PostCreated, post)
    }

    pub fn updated(post: &Post) -> Self {
        Self::new(PostEventType::PostUpdated, post)
    }

    pub fn deleted(post: &Post) -> Self {
        Self::new(PostEventType::PostDeleted, post)
    }
}

impl IntoNatsPayload for PostEvent {
    fn subject(&self) -> String {
        format!(
            "{}.{}",
            POST_EVENTS_SUBJECT_PREFIX,
            self.event_type.subject_suffix()
        )
    }

    fn message_id(&self) -> String {
        self.event_id.to_string()
    }

    fn into_payload(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: PostId::new(),
            user_id: UserId::new(),
            caption: "sunset".to_string(),
            media_file_id: None,
            likes_count: 4,
            comments_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn subject_follows_event_type() {
        let post = sample_post();
        assert_eq!(PostEvent::created(&post).subject(), "post.events.created");
        assert_eq!(PostEvent::updated(&post).subject(), "post.events.updated");
        assert_eq!(PostEvent::deleted(&post).subject(), "post.events.deleted");
    }

    #[test]
    fn payload_uses_screaming_event_type() {
        let post = sample_post();
        let event = PostEvent::created(&post);
        let value: serde_json::Value =
            serde_json::from_slice(&event.into_payload().unwrap()).unwrap();

        assert_eq!(value["event_type"], "POST_CREATED");
        assert_eq!(value["post_id"], post.id.to_string());
        assert_eq!(value["data"]["caption"], "sunset");
        assert_eq!(value["version"], "1.0");
    }
}
