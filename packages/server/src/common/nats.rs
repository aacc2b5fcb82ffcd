//! Common NATS publishing contract.
//!
//! Anything this service puts on the broker implements [`IntoNatsPayload`]:
//! the like/unlike envelope and the post lifecycle events. Publishing itself
//! lives in `nats_tap`.

use bytes::Bytes;

// =============================================================================
// IntoNatsPayload Trait
// =============================================================================

/// A message that knows where it goes and how it is encoded.
///
/// # Example
///
/// ```ignore
/// impl IntoNatsPayload for MyEvent {
///     fn subject(&self) -> String {
///         format!("my_domain.{}", self.kind())
///     }
///
///     fn message_id(&self) -> String {
///         self.id.to_string()
///     }
///
///     fn into_payload(&self) -> serde_json::Result<Bytes> {
///         serde_json::to_vec(self).map(Bytes::from)
///     }
/// }
/// ```
pub trait IntoNatsPayload: Send + Sync {
    /// Full subject, including any partition token.
    fn subject(&self) -> String;

    /// Stable identity of the logical message.
    ///
    /// Sent as `Nats-Msg-Id`, so republishing the same message inside the
    /// stream's duplicate window is dropped by the broker. Must not change
    /// when the same message is retried.
    fn message_id(&self) -> String;

    /// Wire encoding of the message body.
    fn into_payload(&self) -> serde_json::Result<Bytes>;
}
