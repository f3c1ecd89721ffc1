//! State lifecycle engine (C8): the authoritative table of legal status
//! transitions (§3.3). This module is pure — it answers "is this move
//! legal" and "what statuses does this signal expect"; the actual atomic
//! write happens in `db::repository::states::transition`, called from
//! `queue`'s signal handlers.

use crate::models::StateStatus;

/// True iff `from -> to` is one of the edges in the state machine.
pub fn allowed(from: StateStatus, to: StateStatus) -> bool {
    use StateStatus::*;
    match (from, to) {
        (Created, Queued) => true,
        (Queued, Executed) => true,
        (Executed, Success) => true,
        (Executed, NextCreatedError) => true,
        (Queued, Errored) => true,
        (Queued, RetryCreated) => true,
        (Queued, Pruned) => true,
        // reenqueue_after: any non-terminal status may return to CREATED.
        (from, Created) => !matches!(from, Cancelled | Pruned | Success),
        _ => false,
    }
}

/// Statuses the scheduler's lease operation (`CREATED -> QUEUED`) requires.
pub fn expected_for_lease() -> &'static [StateStatus] {
    &[StateStatus::Created]
}

/// Statuses `executed` requires.
pub fn expected_for_executed() -> &'static [StateStatus] {
    &[StateStatus::Queued]
}

/// Statuses `errored` requires — `EXECUTED` is deliberately excluded
/// (§4.7): the only route out of EXECUTED is SUCCESS or NEXT_CREATED_ERROR.
pub fn expected_for_errored() -> &'static [StateStatus] {
    &[StateStatus::Queued]
}

/// Statuses `prune` requires.
pub fn expected_for_prune() -> &'static [StateStatus] {
    &[StateStatus::Queued]
}

/// Statuses `reenqueue_after` requires: anything except the terminal trio
/// it's explicitly barred from (§4.7).
pub fn expected_for_reenqueue() -> &'static [StateStatus] {
    &[
        StateStatus::Created,
        StateStatus::Queued,
        StateStatus::Executed,
        StateStatus::Errored,
        StateStatus::RetryCreated,
        StateStatus::NextCreatedError,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use StateStatus::*;

    #[test]
    fn lease_transition_is_legal() {
        assert!(allowed(Created, Queued));
    }

    #[test]
    fn executed_cannot_be_errored() {
        assert!(!allowed(Executed, Errored));
    }

    #[test]
    fn success_cannot_reenqueue() {
        assert!(!allowed(Success, Created));
    }

    #[test]
    fn queued_can_reenqueue() {
        assert!(allowed(Queued, Created));
    }

    #[test]
    fn pruned_is_terminal() {
        assert!(!allowed(Pruned, Created));
        assert!(!allowed(Pruned, Queued));
    }
}
