use serde::{Deserialize, Serialize};

use crate::common::{LikeEventId, PostId, UserId};
use crate::domains::likes::events::LikeEventKind;

/// Body of `POST /api/posts/:post_id/like` and `/unlike`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LikeRequestInput {
    pub user_id: UserId,
}

/// Returned as soon as the broker holds the intent. Nothing is applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedLikeData {
    pub event_id: LikeEventId,
    pub kind: LikeEventKind,
    pub post_id: PostId,
    pub user_id: UserId,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeStatusData {
    pub post_id: PostId,
    pub user_id: UserId,
    pub liked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_request_needs_a_uuid_user() {
        let user_id = UserId::new();
        let input: LikeRequestInput =
            serde_json::from_value(json!({ "user_id": user_id.to_string() })).unwrap();
        assert_eq!(input.user_id, user_id);

        assert!(serde_json::from_value::<LikeRequestInput>(json!({ "user_id": "bob" })).is_err());
        assert!(serde_json::from_value::<LikeRequestInput>(json!({})).is_err());
    }

    #[test]
    fn like_request_rejects_extra_fields() {
        let body = json!({ "user_id": UserId::new().to_string(), "likes_count": 99 });
        assert!(serde_json::from_value::<LikeRequestInput>(body).is_err());
    }
}
