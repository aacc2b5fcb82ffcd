//! Like/unlike envelope and its routing.
//!
//! One envelope is one user intent. Its `event_id` is minted once when the
//! intent is accepted and travels unchanged through every redelivery.
//!
//! Routing: `post.liked.<p>` / `post.unliked.<p>` where
//! `p = fnv1a64("<post_id>-<user_id>") % partitions`. Both kinds of the same
//! pair share `p`, and one consumer reads both subjects of a partition from a
//! single stream, so a pair's like and unlike are applied in publish order.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::common::{IntoNatsPayload, LikeEventId, PostId, UserId};
use crate::kernel::streams::{LIKED_SUBJECT_PREFIX, UNLIKED_SUBJECT_PREFIX};

/// Highest envelope schema this build understands.
pub const LIKE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeEventKind {
    Like,
    Unlike,
}

impl LikeEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LikeEventKind::Like => "like",
            LikeEventKind::Unlike => "unlike",
        }
    }

    pub fn subject_prefix(self) -> &'static str {
        match self {
            LikeEventKind::Like => LIKED_SUBJECT_PREFIX,
            LikeEventKind::Unlike => UNLIKED_SUBJECT_PREFIX,
        }
    }
}

impl fmt::Display for LikeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LikeEventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "like" => Ok(LikeEventKind::Like),
            "unlike" => Ok(LikeEventKind::Unlike),
            _ => Err(anyhow::anyhow!("Invalid like event kind: {}", s)),
        }
    }
}

/// Why a delivered message could not be turned into an envelope.
///
/// These never heal on redelivery; the consumer dead-letters them at once.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("unsupported envelope schema version {0}")]
    UnsupportedVersion(u32),

    #[error("subject {subject} does not carry {kind} events")]
    SubjectMismatch { subject: String, kind: LikeEventKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEnvelope {
    pub event_id: LikeEventId,
    pub kind: LikeEventKind,
    pub post_id: PostId,
    pub user_id: UserId,
    /// When the user acted, not when the message was delivered.
    pub occurred_at: DateTime<Utc>,
    pub schema_version: u32,
    /// Partition the producer routed to. Not part of the payload.
    #[serde(skip)]
    pub partition: u32,
}

impl LikeEnvelope {
    /// A brand new intent with a fresh event id.
    pub fn new(kind: LikeEventKind, post_id: PostId, user_id: UserId, partitions: u32) -> Self {
        Self {
            event_id: LikeEventId::new(),
            kind,
            post_id,
            user_id,
            occurred_at: Utc::now(),
            schema_version: LIKE_SCHEMA_VERSION,
            partition: partition_for(post_id, user_id, partitions),
        }
    }

    /// Decode a delivered message, checking it arrived on the right subject.
    pub fn decode(subject: &str, payload: &[u8]) -> Result<Self, EnvelopeError> {
        let mut envelope: LikeEnvelope = serde_json::from_slice(payload)?;

        if envelope.schema_version == 0 || envelope.schema_version > LIKE_SCHEMA_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(envelope.schema_version));
        }

        match parse_subject(subject) {
            Some((kind, partition)) if kind == envelope.kind => {
                envelope.partition = partition;
                Ok(envelope)
            }
            _ => Err(EnvelopeError::SubjectMismatch {
                subject: subject.to_string(),
                kind: envelope.kind,
            }),
        }
    }
}

impl IntoNatsPayload for LikeEnvelope {
    fn subject(&self) -> String {
        subject_for(self.kind, self.partition)
    }

    fn message_id(&self) -> String {
        self.event_id.to_string()
    }

    fn into_payload(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

// =============================================================================
// Partitioning
// =============================================================================

/// Key shared by every event of one (post, user) pair.
pub fn partition_key(post_id: PostId, user_id: UserId) -> String {
    format!("{}-{}", post_id, user_id)
}

/// 64-bit FNV-1a, stable across builds and platforms.
pub fn fnv1a(key: impl AsRef<[u8]>) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    key.as_ref().iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

pub fn partition_for(post_id: PostId, user_id: UserId, partitions: u32) -> u32 {
    let partitions = u64::from(partitions.max(1));
    (fnv1a(partition_key(post_id, user_id)) % partitions) as u32
}

pub fn subject_for(kind: LikeEventKind, partition: u32) -> String {
    format!("{}.{}", kind.subject_prefix(), partition)
}

/// Both kind subjects of one partition, as consumed together.
pub fn partition_subjects(partition: u32) -> Vec<String> {
    vec![
        subject_for(LikeEventKind::Like, partition),
        subject_for(LikeEventKind::Unlike, partition),
    ]
}

pub fn parse_subject(subject: &str) -> Option<(LikeEventKind, u32)> {
    let (prefix, partition) = subject.rsplit_once('.')?;
    let kind = if prefix == LIKED_SUBJECT_PREFIX {
        LikeEventKind::Like
    } else if prefix == UNLIKED_SUBJECT_PREFIX {
        LikeEventKind::Unlike
    } else {
        return None;
    };
    Some((kind, partition.parse().ok()?))
}
