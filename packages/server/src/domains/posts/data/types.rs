//! Request payloads for the posts API.
//!
//! Unknown fields are rejected, so a client can never smuggle a column such
//! as `likes_count` into an update.

use serde::Deserialize;
use thiserror::Error;

use crate::common::{MediaFileId, UserId};
use crate::domains::posts::models::UpdatePost;

pub const MAX_CAPTION_CHARS: usize = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("caption must be at most {max} characters (got {actual})")]
    CaptionTooLong { max: usize, actual: usize },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostInput {
    pub user_id: UserId,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub media_file_id: Option<MediaFileId>,
}

impl CreatePostInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_caption(&self.caption)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostInput {
    #[serde(default)]
    pub caption: Option<String>,
}

impl UpdatePostInput {
    /// Validate and turn into the model's update set.
    pub fn into_update(self) -> Result<UpdatePost, ValidationError> {
        if let Some(caption) = &self.caption {
            validate_caption(caption)?;
        }
        Ok(UpdatePost {
            caption: self.caption,
        })
    }
}

fn validate_caption(caption: &str) -> Result<(), ValidationError> {
    let actual = caption.chars().count();
    if actual > MAX_CAPTION_CHARS {
        return Err(ValidationError::CaptionTooLong {
            max: MAX_CAPTION_CHARS,
            actual,
        });
    }
    Ok(())
}
