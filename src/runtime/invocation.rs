// Copyright 2025 Cowboy AI, LLC.

//! One method call travelling through a composite

use super::composite::CompositeInstance;
use crate::errors::{InvocationError, InvocationResult};
use crate::fragment::{Concern, Mixin};
use crate::state_machine::{MealyMachine, MealyStateTransitions, State};
use crate::structure::Module;
use crate::types::{MethodDeclaration, TypeName};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::cell::Cell;
use tracing::{debug, trace};

static NULL: Value = Value::Null;

/// A call of a composite method, as seen by concerns, mixins and side-effects
pub struct Invocation<'a> {
    this: &'a CompositeInstance,
    method: &'a MethodDeclaration,
    args: Cow<'a, [Value]>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(this: &'a CompositeInstance, method: &'a MethodDeclaration, args: Cow<'a, [Value]>) -> Self {
        Self { this, method, args }
    }

    /// The composite being invoked
    pub fn this(&self) -> &'a CompositeInstance {
        self.this
    }

    /// The invoked method
    pub fn method(&self) -> &'a MethodDeclaration {
        self.method
    }

    /// Arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`, null when absent
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&NULL)
    }

    /// Same call with different arguments, for concerns that rewrite them
    pub fn with_args(&self, args: Vec<Value>) -> Invocation<'a> {
        Invocation {
            this: self.this,
            method: self.method,
            args: Cow::Owned(args),
        }
    }

    /// Module of the invoked composite
    pub fn module(&self) -> Result<Module, InvocationError> {
        self.this.module()
    }
}

/// The rest of a concern chain
///
/// Consumed by [`proceed`](Self::proceed); a concern that never calls it
/// short-circuits the mixin.
pub struct Next<'a> {
    concerns: &'a [Box<dyn Concern>],
    mixin: &'a dyn Mixin,
    reached_mixin: &'a Cell<bool>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(concerns: &'a [Box<dyn Concern>], mixin: &'a dyn Mixin, reached_mixin: &'a Cell<bool>) -> Self {
        Self {
            concerns,
            mixin,
            reached_mixin,
        }
    }

    /// Hand the invocation to the next concern, or to the mixin
    pub fn proceed(self, invocation: &Invocation<'_>) -> InvocationResult {
        match self.concerns.split_first() {
            Some((concern, rest)) => concern.invoke(
                invocation,
                Next {
                    concerns: rest,
                    mixin: self.mixin,
                    reached_mixin: self.reached_mixin,
                },
            ),
            None => {
                self.reached_mixin.set(true);
                self.mixin.invoke(invocation)
            }
        }
    }
}

/// Phases of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InvocationPhase {
    /// Call received
    Enter,
    /// Parameter constraints checked
    Constraints,
    /// Concern chain running
    Concerns,
    /// Mixin reached
    Mixin,
    /// Side-effects running
    SideEffects,
    /// Result returned
    Return,
    /// Dispatch failed
    Failed,
}

impl State for InvocationPhase {
    fn name(&self) -> &'static str {
        match self {
            InvocationPhase::Enter => "Enter",
            InvocationPhase::Constraints => "Constraints",
            InvocationPhase::Concerns => "Concerns",
            InvocationPhase::Mixin => "Mixin",
            InvocationPhase::SideEffects => "SideEffects",
            InvocationPhase::Return => "Return",
            InvocationPhase::Failed => "Failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, InvocationPhase::Return | InvocationPhase::Failed)
    }
}

impl MealyStateTransitions for InvocationPhase {
    type Input = ();
    type Output = ();

    fn can_transition_to(&self, target: &Self, input: &Self::Input) -> bool {
        self.valid_transitions(input).contains(target)
    }

    fn valid_transitions(&self, _input: &Self::Input) -> Vec<Self> {
        use InvocationPhase::*;
        match self {
            Enter => vec![Constraints],
            Constraints => vec![Concerns, Failed],
            // A concern may return without proceeding to the mixin
            Concerns => vec![Mixin, SideEffects, Failed],
            Mixin => vec![SideEffects, Failed],
            SideEffects => vec![Return, Failed],
            Return | Failed => vec![],
        }
    }

    fn transition_output(&self, _target: &Self, _input: &Self::Input) -> Self::Output {}
}

/// Follows a dispatch through its phases and traces each move
pub(crate) struct PhaseTracker<'a> {
    machine: MealyMachine<InvocationPhase>,
    composite: &'a TypeName,
    method: &'a str,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(composite: &'a TypeName, method: &'a str) -> Self {
        Self {
            machine: MealyMachine::new(InvocationPhase::Enter),
            composite,
            method,
        }
    }

    pub(crate) fn advance(&mut self, phase: InvocationPhase) {
        match self.machine.transition_to(phase, ()) {
            Ok(transition) => trace!(
                composite = %self.composite,
                method = self.method,
                from = transition.from.name(),
                to = transition.to.name(),
                "dispatch phase"
            ),
            Err(invalid) => debug!(
                composite = %self.composite,
                method = self.method,
                error = %invalid,
                "unexpected dispatch phase"
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> InvocationPhase {
        *self.machine.current_state()
    }
}
