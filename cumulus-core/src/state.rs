// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deploy and function state machines with typed state transitions.
//!
//! A deploy call moves through:
//! Start → Packaging → Uploading → AttemptingCreate → {Polling | AttemptingUpdate → Polling}
//! → {Succeeded | Failed | TimedOut}.
//! Invalid transitions result in StateTransitionError.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;
use crate::types::FunctionName;

/// Phases of a single deploy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployState {
    /// Nothing has happened yet.
    Start,

    /// Archiving the source tree.
    Packaging,

    /// Writing the archive to the blob store.
    Uploading,

    /// Asking the registry to create the function.
    AttemptingCreate,

    /// The function already existed; asking the registry to update it.
    AttemptingUpdate,

    /// Waiting for the create or update operation to finish.
    Polling,

    /// The operation finished and the function is ready.
    Succeeded,

    /// A step failed or the registry reported a failed operation.
    Failed,

    /// The wait budget ran out before the operation finished.
    TimedOut,
}

impl DeployState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Packaging => "Packaging",
            Self::Uploading => "Uploading",
            Self::AttemptingCreate => "AttemptingCreate",
            Self::AttemptingUpdate => "AttemptingUpdate",
            Self::Polling => "Polling",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
        }
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    /// Check if transition to the target state is valid.
    ///
    /// `AttemptingUpdate` never leads back to `AttemptingCreate`: a conflict on
    /// update is a hard failure, not another round of the fallback.
    pub fn can_transition_to(&self, target: DeployState) -> bool {
        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, target),
            (Self::Start, Self::Packaging) |
            (Self::Packaging, Self::Uploading) |
            (Self::Uploading, Self::AttemptingCreate) |
            // Created, or conflict → fallback
            (Self::AttemptingCreate, Self::Polling) |
            (Self::AttemptingCreate, Self::AttemptingUpdate) |
            (Self::AttemptingUpdate, Self::Polling) |
            (Self::Polling, Self::Succeeded) |
            (Self::Polling, Self::TimedOut) |
            // Any live phase can fail
            (_, Self::Failed)
        )
    }
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one deploy call.
/// Enforces valid state transitions and tracks elapsed time.
#[derive(Debug)]
pub struct DeployStateMachine {
    name: FunctionName,
    current_state: DeployState,
    started: Instant,
    history: Vec<DeployState>,
}

impl DeployStateMachine {
    /// Create a new state machine for deploying a function.
    pub fn new(name: FunctionName) -> Self {
        Self {
            name,
            current_state: DeployState::Start,
            started: Instant::now(),
            history: vec![DeployState::Start],
        }
    }

    /// Get the current state.
    pub fn state(&self) -> DeployState {
        self.current_state
    }

    /// Get the function name.
    pub fn function_name(&self) -> &FunctionName {
        &self.name
    }

    /// Every state visited so far, in order, starting with `Start`.
    pub fn history(&self) -> &[DeployState] {
        &self.history
    }

    /// Get time since the deploy started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Attempt to transition to a new state.
    /// Returns Ok(()) if successful, or StateTransitionError if invalid.
    pub fn transition_to(&mut self, target: DeployState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                name: self.name.clone(),
                state: self.current_state.name(),
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                name: self.name.clone(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            function = %self.name,
            from = self.current_state.name(),
            to = target.name(),
            "Deploy state transition"
        );

        self.current_state = target;
        self.history.push(target);

        Ok(())
    }
}

/// Lifecycle of a function resource held by a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionState {
    /// A create or update is in flight.
    Pending,

    /// The latest package is live and invokable.
    Active,

    /// The latest create or update failed.
    Failed,
}

impl FunctionState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Failed => "Failed",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: FunctionState) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Failed)
                | (Self::Active, Self::Pending)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Move to `target`, rejecting transitions the lifecycle does not allow.
    ///
    /// A function already `Pending` cannot start another operation.
    pub fn transition_to(
        &mut self,
        name: &FunctionName,
        target: FunctionState,
    ) -> Result<(), StateTransitionError> {
        if !self.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                name: name.clone(),
                from: self.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            function = %name,
            from = self.name(),
            to = target.name(),
            "Function state transition"
        );
        *self = target;
        Ok(())
    }

    /// Check if the function can be invoked.
    pub fn is_invokable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for FunctionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
