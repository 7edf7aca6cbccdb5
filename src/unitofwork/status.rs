// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle of a unit of work as a Mealy machine

use crate::state_machine::{MealyStateTransitions, State, TransitionInput};
use serde::Serialize;

/// Status of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnitOfWorkStatus {
    /// Accepting operations; current on its thread
    Open,
    /// Detached from the thread; only resume or discard are allowed
    Paused,
    /// Running callbacks and the store prepare/commit
    Completing,
    /// Changes applied
    Committed,
    /// Changes dropped
    Discarded,
}

/// Operations that move a unit of work between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitOfWorkInput {
    /// Detach from the thread
    Pause,
    /// Reattach to the thread
    Resume,
    /// Start completion
    Complete,
    /// Completion succeeded
    Commit,
    /// Completion hit a version conflict
    Fail,
    /// Completion failed but may be retried
    Abort,
    /// Drop all changes
    Discard,
}

impl TransitionInput for UnitOfWorkInput {
    fn description(&self) -> String {
        format!("{self:?}")
    }
}

/// What a transition does to the thread's stack of current units of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AmbientAction {
    /// Push onto the stack
    Attach,
    /// Remove from the stack
    Detach,
    /// Leave the stack alone
    Keep,
}

impl State for UnitOfWorkStatus {
    fn name(&self) -> &'static str {
        match self {
            UnitOfWorkStatus::Open => "open",
            UnitOfWorkStatus::Paused => "paused",
            UnitOfWorkStatus::Completing => "completing",
            UnitOfWorkStatus::Committed => "committed",
            UnitOfWorkStatus::Discarded => "discarded",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, UnitOfWorkStatus::Committed | UnitOfWorkStatus::Discarded)
    }
}

impl MealyStateTransitions for UnitOfWorkStatus {
    type Input = UnitOfWorkInput;
    type Output = AmbientAction;

    fn can_transition_to(&self, target: &Self, input: &Self::Input) -> bool {
        self.valid_transitions(input).contains(target)
    }

    fn valid_transitions(&self, input: &Self::Input) -> Vec<Self> {
        use UnitOfWorkInput as I;
        use UnitOfWorkStatus as S;
        match (self, input) {
            (S::Open, I::Pause) => vec![S::Paused],
            (S::Paused, I::Resume) => vec![S::Open],
            (S::Open, I::Complete) => vec![S::Completing],
            (S::Completing, I::Commit) => vec![S::Committed],
            (S::Completing, I::Fail) => vec![S::Discarded],
            (S::Completing, I::Abort) => vec![S::Open],
            (S::Open | S::Paused, I::Discard) => vec![S::Discarded],
            _ => vec![],
        }
    }

    fn transition_output(&self, target: &Self, _input: &Self::Input) -> Self::Output {
        match (self, target) {
            (UnitOfWorkStatus::Paused, UnitOfWorkStatus::Open) => AmbientAction::Attach,
            (UnitOfWorkStatus::Open, UnitOfWorkStatus::Paused) => AmbientAction::Detach,
            (_, UnitOfWorkStatus::Committed | UnitOfWorkStatus::Discarded) => AmbientAction::Detach,
            _ => AmbientAction::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MealyMachine;
    use test_case::test_case;

    #[test_case(UnitOfWorkStatus::Open, UnitOfWorkInput::Pause, UnitOfWorkStatus::Paused, AmbientAction::Detach; "pause detaches")]
    #[test_case(UnitOfWorkStatus::Paused, UnitOfWorkInput::Resume, UnitOfWorkStatus::Open, AmbientAction::Attach; "resume attaches")]
    #[test_case(UnitOfWorkStatus::Open, UnitOfWorkInput::Complete, UnitOfWorkStatus::Completing, AmbientAction::Keep; "completion starts attached")]
    #[test_case(UnitOfWorkStatus::Completing, UnitOfWorkInput::Abort, UnitOfWorkStatus::Open, AmbientAction::Keep; "abort keeps it current")]
    #[test_case(UnitOfWorkStatus::Completing, UnitOfWorkInput::Commit, UnitOfWorkStatus::Committed, AmbientAction::Detach; "commit detaches")]
    #[test_case(UnitOfWorkStatus::Paused, UnitOfWorkInput::Discard, UnitOfWorkStatus::Discarded, AmbientAction::Detach; "discard while paused")]
    fn test_allowed_transitions(
        from: UnitOfWorkStatus,
        input: UnitOfWorkInput,
        to: UnitOfWorkStatus,
        action: AmbientAction,
    ) {
        let mut machine = MealyMachine::new(from);
        let transition = machine.transition_to(to, input).unwrap();
        assert_eq!(transition.output, action);
        assert_eq!(*machine.current_state(), to);
    }

    #[test_case(UnitOfWorkStatus::Paused, UnitOfWorkInput::Complete, UnitOfWorkStatus::Completing; "complete while paused")]
    #[test_case(UnitOfWorkStatus::Open, UnitOfWorkInput::Resume, UnitOfWorkStatus::Open; "resume while open")]
    #[test_case(UnitOfWorkStatus::Paused, UnitOfWorkInput::Pause, UnitOfWorkStatus::Paused; "pause twice")]
    fn test_rejected_transitions(from: UnitOfWorkStatus, input: UnitOfWorkInput, to: UnitOfWorkStatus) {
        let mut machine = MealyMachine::new(from);
        assert!(machine.transition_to(to, input).is_err());
    }

    #[test]
    fn test_terminal_statuses_accept_nothing() {
        let mut machine = MealyMachine::new(UnitOfWorkStatus::Committed);
        let err = machine
            .transition_to(UnitOfWorkStatus::Discarded, UnitOfWorkInput::Discard)
            .unwrap_err();
        assert_eq!(err.from, "committed");
    }
}
