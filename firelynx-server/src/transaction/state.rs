//! Transaction lifecycle state machine
//!
//! Every transition is guarded: an illegal request returns an error and
//! leaves the transaction untouched. Legal transitions only ever move
//! forward, so no sequence of them revisits an earlier state.

use std::fmt;

/// Lifecycle state of a configuration transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Created,
    Validated,
    Invalid,
    Executing,
    Failed,
    Compensating,
    Compensated,
    Succeeded,
    Reloading,
    Completed,
}

impl TransactionState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Compensated | Self::Invalid)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Validated)
                | (Self::Created, Self::Invalid)
                | (Self::Validated, Self::Executing)
                | (Self::Executing, Self::Succeeded)
                | (Self::Executing, Self::Failed)
                | (Self::Failed, Self::Compensating)
                | (Self::Compensating, Self::Compensated)
                | (Self::Succeeded, Self::Reloading)
                | (Self::Reloading, Self::Completed)
        )
    }

    /// Monotone progress rank: every legal transition strictly
    /// increases it.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Validated => 1,
            Self::Invalid => 2,
            Self::Executing => 2,
            Self::Succeeded => 3,
            Self::Failed => 3,
            Self::Reloading => 4,
            Self::Compensating => 4,
            Self::Completed => 5,
            Self::Compensated => 5,
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::Invalid => "invalid",
            Self::Executing => "executing",
            Self::Failed => "failed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
            Self::Succeeded => "succeeded",
            Self::Reloading => "reloading",
            Self::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionState; 10] = [
        TransactionState::Created,
        TransactionState::Validated,
        TransactionState::Invalid,
        TransactionState::Executing,
        TransactionState::Failed,
        TransactionState::Compensating,
        TransactionState::Compensated,
        TransactionState::Succeeded,
        TransactionState::Reloading,
        TransactionState::Completed,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            TransactionState::Created,
            TransactionState::Validated,
            TransactionState::Executing,
            TransactionState::Succeeded,
            TransactionState::Reloading,
            TransactionState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_path_is_legal() {
        assert!(TransactionState::Executing.can_transition_to(TransactionState::Failed));
        assert!(TransactionState::Failed.can_transition_to(TransactionState::Compensating));
        assert!(TransactionState::Compensating.can_transition_to(TransactionState::Compensated));
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for terminal in ALL.iter().filter(|s| s.is_terminal()) {
            for next in ALL {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }
    }

    #[test]
    fn test_every_legal_transition_increases_rank() {
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    assert!(
                        to.rank() > from.rank(),
                        "{} ({}) -> {} ({})",
                        from,
                        from.rank(),
                        to,
                        to.rank()
                    );
                }
            }
        }
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        assert!(!TransactionState::Created.can_transition_to(TransactionState::Executing));
        assert!(!TransactionState::Validated.can_transition_to(TransactionState::Succeeded));
        assert!(!TransactionState::Succeeded.can_transition_to(TransactionState::Completed));
    }
}
