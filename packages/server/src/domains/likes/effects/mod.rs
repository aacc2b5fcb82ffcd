pub mod consumer;
pub mod dead_letter;
pub mod producer;
pub mod reconciler;

pub use consumer::{
    Delivery, Disposition, InboundMessage, LikeConsumerGroup, LikeEventHandler, RetryPolicy,
    UnreadableDelivery,
};
pub use dead_letter::{DeadLetter, DeadLetterSink, NatsDeadLetterSink};
pub use producer::LikeEventProducer;
pub use reconciler::{EnvelopeApplier, ReconcileError, ReconcileOutcome, Reconciler};
