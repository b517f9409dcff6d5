//! Custom error types for Cumulus.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::registry::OperationKind;
use crate::types::FunctionName;

/// Top-level error type for the Cumulus deployment workflow.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum CumulusError {
    // =========================================================================
    // Configuration Errors - Fail-Fast Before Any Network Call
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // =========================================================================
    // Packaging Errors
    // =========================================================================
    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    // =========================================================================
    // Collaborator Errors - Surfaced Unchanged
    // =========================================================================
    #[error("Blob store error: {0}")]
    Store(#[from] StoreError),

    #[error("Function registry error: {0}")]
    Registry(#[from] RegistryError),

    // =========================================================================
    // Operation Outcomes
    // =========================================================================
    #[error("{kind} of function {name} failed: {detail}")]
    DeploymentFailed {
        name: FunctionName,
        kind: OperationKind,
        detail: String,
    },

    #[error(
        "{kind} of function {name} did not finish within {}s; the operation may still complete",
        .waited.as_secs()
    )]
    DeploymentTimeout {
        name: FunctionName,
        kind: OperationKind,
        waited: Duration,
    },

    // =========================================================================
    // State Machine Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),
}

impl CumulusError {
    /// True when the outcome is unknown rather than failed.
    ///
    /// A timed-out deploy may still converge server-side.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::DeploymentTimeout { .. })
    }
}

/// Configuration errors stop the process before any collaborator is called.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },
}

/// Errors raised while building a deployment package.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Source path does not exist: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source path contains no files: {path}")]
    EmptySource { path: PathBuf },

    #[error("IO error: {context} - {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blob store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not authorized to write {store}/{key}: {message}")]
    Auth {
        store: String,
        key: String,
        message: String,
    },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Store returned {status}: {message}")]
    Service { status: u16, message: String },
}

/// Function registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Function already exists: {name}")]
    Conflict { name: FunctionName },

    #[error("Request rejected: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Function not found: {name}")]
    NotFound { name: FunctionName },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Registry returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Malformed registry response: {message}")]
    Decode { message: String },
}

/// State transition errors for the deploy state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} while deploying {name}")]
    InvalidTransition {
        name: FunctionName,
        from: &'static str,
        to: &'static str,
    },

    #[error("Deploy of {name} is in terminal state: {state}")]
    TerminalState {
        name: FunctionName,
        state: &'static str,
    },
}

/// Result type alias using CumulusError.
pub type CumulusResult<T> = Result<T, CumulusError>;
