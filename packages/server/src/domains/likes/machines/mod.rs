use crate::domains::likes::events::LikeEventKind;
use crate::domains::likes::models::LedgerOutcome;

/// What the reconciler must do for an unseen event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTransition {
    /// Create the pair and add one to the counter.
    InsertLike,
    /// Remove the pair and subtract one from the counter.
    DeleteLike,
    /// Change nothing; only record the outcome.
    RecordOnly(LedgerOutcome),
}

impl LikeTransition {
    /// Counter delta the transition applies.
    pub fn counter_delta(self) -> i32 {
        match self {
            LikeTransition::InsertLike => 1,
            LikeTransition::DeleteLike => -1,
            LikeTransition::RecordOnly(_) => 0,
        }
    }
}

/// Like state machine - pure decision logic
///
/// Decides from the event kind and whether the pair is currently liked.
/// Events already in the ledger never reach this point.
pub struct LikeMachine;

impl LikeMachine {
    pub fn decide(kind: LikeEventKind, currently_liked: bool) -> LikeTransition {
        match (kind, currently_liked) {
            (LikeEventKind::Like, false) => LikeTransition::InsertLike,
            // Same state reached by another event
            (LikeEventKind::Like, true) => LikeTransition::RecordOnly(LedgerOutcome::Duplicate),
            (LikeEventKind::Unlike, true) => LikeTransition::DeleteLike,
            (LikeEventKind::Unlike, false) => {
                LikeTransition::RecordOnly(LedgerOutcome::NotFoundNoop)
            }
        }
    }
}
