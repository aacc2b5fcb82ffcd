//! JetStream stream layout.
//!
//! Streams are created on boot if missing. Existing streams are left
//! untouched.
//!
//! ```text
//! POST_EVENTS      post.events.>                       7 days
//! POST_LIKES       post.liked.<p>, post.unliked.<p>    3 days
//! POST_LIKES_DLQ   post.likes.dead_letter             14 days
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream};
use tracing::info;

pub const POST_EVENTS_STREAM: &str = "POST_EVENTS";
pub const POST_LIKES_STREAM: &str = "POST_LIKES";
pub const POST_LIKES_DLQ_STREAM: &str = "POST_LIKES_DLQ";

pub const POST_EVENTS_SUBJECT_PREFIX: &str = "post.events";
pub const LIKED_SUBJECT_PREFIX: &str = "post.liked";
pub const UNLIKED_SUBJECT_PREFIX: &str = "post.unliked";
pub const DEAD_LETTER_SUBJECT: &str = "post.likes.dead_letter";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Window in which a repeated `Nats-Msg-Id` is dropped by the broker.
const DUPLICATE_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Stream definitions owned by this service.
pub fn stream_configs() -> Vec<stream::Config> {
    vec![
        stream::Config {
            name: POST_EVENTS_STREAM.to_string(),
            subjects: vec![format!("{}.>", POST_EVENTS_SUBJECT_PREFIX)],
            max_age: 7 * DAY,
            duplicate_window: DUPLICATE_WINDOW,
            ..Default::default()
        },
        stream::Config {
            name: POST_LIKES_STREAM.to_string(),
            subjects: vec![
                format!("{}.*", LIKED_SUBJECT_PREFIX),
                format!("{}.*", UNLIKED_SUBJECT_PREFIX),
            ],
            max_age: 3 * DAY,
            duplicate_window: DUPLICATE_WINDOW,
            ..Default::default()
        },
        stream::Config {
            name: POST_LIKES_DLQ_STREAM.to_string(),
            subjects: vec![DEAD_LETTER_SUBJECT.to_string()],
            max_age: 14 * DAY,
            duplicate_window: DUPLICATE_WINDOW,
            ..Default::default()
        },
    ]
}

/// Create any missing stream.
pub async fn ensure_streams(jetstream: &jetstream::Context) -> Result<()> {
    for config in stream_configs() {
        let name = config.name.clone();
        jetstream
            .get_or_create_stream(config)
            .await
            .with_context(|| format!("Failed to ensure stream {}", name))?;
        info!(stream = %name, "JetStream stream ready");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_stream_covers_both_kinds_per_partition() {
        let configs = stream_configs();
        let likes = configs
            .iter()
            .find(|c| c.name == POST_LIKES_STREAM)
            .unwrap();

        assert_eq!(likes.subjects, vec!["post.liked.*", "post.unliked.*"]);
        assert_eq!(likes.max_age, 3 * DAY);
    }

    #[test]
    fn dead_letters_do_not_overlap_like_subjects() {
        // "post.likes.dead_letter" has three tokens; the like wildcards only
        // match "post.liked.<p>" / "post.unliked.<p>".
        let configs = stream_configs();
        let dlq = configs
            .iter()
            .find(|c| c.name == POST_LIKES_DLQ_STREAM)
            .unwrap();

        assert_eq!(dlq.subjects, vec![DEAD_LETTER_SUBJECT]);
        assert!(!DEAD_LETTER_SUBJECT.starts_with(LIKED_SUBJECT_PREFIX));
    }
}
