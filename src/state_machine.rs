// Copyright 2025 Cowboy AI, LLC.

//! Mealy state machines for runtime lifecycles
//!
//! Lifecycles whose legal moves depend on both the current state and the
//! requested operation are expressed as Mealy machines: the output of a
//! transition depends on the current state AND the input.
//!
//! - [`UnitOfWorkStatus`](crate::unitofwork::UnitOfWorkStatus): pause,
//!   resume, completion and discard of a unit of work
//! - [`InvocationPhase`](crate::runtime::InvocationPhase): the phases of one
//!   method dispatch

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;

/// Input to a state machine transition
pub trait TransitionInput: Debug + Clone + Send + Sync {
    /// Get a description of this input for logging
    fn description(&self) -> String;
}

impl TransitionInput for () {
    fn description(&self) -> String {
        "advance".to_string()
    }
}

/// Trait for types that can be used as states in a state machine
pub trait State: Debug + Clone + PartialEq + Eq + Send + Sync {
    /// Get the name of this state for logging/debugging
    fn name(&self) -> &'static str;

    /// Check if this is a terminal state
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Mealy Machine: Output depends on current state AND input
pub trait MealyStateTransitions: State {
    /// The input type for transitions
    type Input: TransitionInput;
    /// The output type for transitions
    type Output: Debug + Clone;

    /// Check if a transition is valid given the input
    fn can_transition_to(&self, target: &Self, input: &Self::Input) -> bool;

    /// Get valid transitions for a given input
    fn valid_transitions(&self, input: &Self::Input) -> Vec<Self>;

    /// Get the output for a transition
    fn transition_output(&self, target: &Self, input: &Self::Input) -> Self::Output;
}

/// A transition that the machine does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition from {from} to {to} on {input}")]
pub struct InvalidTransition {
    /// Current state
    pub from: &'static str,
    /// Requested state
    pub to: &'static str,
    /// Input description
    pub input: String,
}

/// Record of a state transition
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition<S, I, O> {
    /// The state before the transition
    pub from: S,
    /// The state after the transition
    pub to: S,
    /// The input that triggered the transition
    pub input: I,
    /// The output produced by the transition
    pub output: O,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Mealy state machine tracking the current state and its history
#[derive(Debug, Clone)]
pub struct MealyMachine<S: MealyStateTransitions> {
    current_state: S,
    transition_history: Vec<StateTransition<S, S::Input, S::Output>>,
}

impl<S: MealyStateTransitions> MealyMachine<S> {
    /// Create a machine in `initial_state`
    pub fn new(initial_state: S) -> Self {
        Self {
            current_state: initial_state,
            transition_history: Vec::new(),
        }
    }

    /// Get the current state
    pub fn current_state(&self) -> &S {
        &self.current_state
    }

    /// Transition to a new state with input
    pub fn transition_to(
        &mut self,
        new_state: S,
        input: S::Input,
    ) -> Result<StateTransition<S, S::Input, S::Output>, InvalidTransition> {
        if self.current_state.is_terminal()
            || !self.current_state.can_transition_to(&new_state, &input)
        {
            return Err(InvalidTransition {
                from: self.current_state.name(),
                to: new_state.name(),
                input: input.description(),
            });
        }

        let output = self.current_state.transition_output(&new_state, &input);
        let transition = StateTransition {
            from: self.current_state.clone(),
            to: new_state.clone(),
            input,
            output,
            timestamp: Utc::now(),
        };

        self.current_state = new_state;
        self.transition_history.push(transition.clone());
        Ok(transition)
    }

    /// Get the transition history
    pub fn history(&self) -> &[StateTransition<S, S::Input, S::Output>] {
        &self.transition_history
    }

    /// Check if in a specific state
    pub fn is_in_state(&self, state: &S) -> bool {
        &self.current_state == state
    }

    /// Get valid next states for given input
    pub fn valid_next_states(&self, input: &S::Input) -> Vec<S> {
        self.current_state.valid_transitions(input)
    }
}
