// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deploy orchestration.
//!
//! [`Deployer::deploy`] packages a source tree, uploads it, and creates the
//! function, falling back to an update when the registry says the function
//! already exists. It then polls the resulting operation until it finishes or
//! the configured `max_wait` runs out.
//!
//! Running the same deploy twice converges on the same end state: the second
//! run takes the update path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::DeployConfig;
use crate::error::{CumulusError, CumulusResult};
use crate::package::build_package;
use crate::polling::PollingBackoffPolicy;
use crate::registry::{
    CreateOutcome, Invocation, OperationHandle, OperationKind, OperationStatus,
    SharedFunctionRegistry,
};
use crate::state::{DeployState, DeployStateMachine};
use crate::storage::SharedBlobStore;
use crate::types::{FunctionDefinition, FunctionName, PackageLocation};

/// Which path a successful deploy took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    Created,
    Updated,
}

impl DeployOutcome {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl From<OperationKind> for DeployOutcome {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Create => Self::Created,
            OperationKind::Update => Self::Updated,
        }
    }
}

impl std::fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Summary of a successful deploy.
#[derive(Debug, Clone)]
pub struct DeployResult {
    pub name: FunctionName,
    pub outcome: DeployOutcome,
    pub package: PackageLocation,
    /// Hex sha256 of the uploaded archive.
    pub digest: String,
    pub package_size: usize,
    /// Number of status calls made before the operation finished.
    pub polls: u32,
    pub elapsed: Duration,
    pub states: Vec<DeployState>,
}

/// Deploys functions through a blob store and a function registry.
pub struct Deployer {
    config: DeployConfig,
    blobs: SharedBlobStore,
    registry: SharedFunctionRegistry,
    backoff: Arc<dyn PollingBackoffPolicy>,
    /// One lock per function name; deploys of different names never contend.
    locks: DashMap<FunctionName, Arc<Mutex<()>>>,
}

impl Deployer {
    pub fn new(
        config: DeployConfig,
        blobs: SharedBlobStore,
        registry: SharedFunctionRegistry,
    ) -> Self {
        let backoff = Arc::new(config.polling.clone());
        Self {
            config,
            blobs,
            registry,
            backoff,
            locks: DashMap::new(),
        }
    }

    /// Replace the polling policy built from the configuration.
    pub fn with_backoff(mut self, backoff: impl PollingBackoffPolicy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Deploy `source` as function `name`, creating or updating it.
    ///
    /// Concurrent calls for the same name on this deployer run one at a time.
    /// A [`CumulusError::DeploymentTimeout`] means the outcome is unknown.
    pub async fn deploy(&self, name: &FunctionName, source: &Path) -> CumulusResult<DeployResult> {
        let lock = self.locks.entry(name.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.deploy_locked(name, source).await
        };

        // Nobody else holds or waits on the lock: forget it.
        self.locks.remove_if(name, |_, entry| Arc::strong_count(entry) == 2);

        result
    }

    async fn deploy_locked(
        &self,
        name: &FunctionName,
        source: &Path,
    ) -> CumulusResult<DeployResult> {
        let mut machine = DeployStateMachine::new(name.clone());
        match self.run(&mut machine, source).await {
            Ok(result) => Ok(result),
            Err(err) => {
                let terminal = if err.is_inconclusive() {
                    DeployState::TimedOut
                } else {
                    DeployState::Failed
                };
                if let Err(e) = machine.transition_to(terminal) {
                    tracing::debug!(function = %name, error = %e, "Could not record deploy failure");
                }
                tracing::warn!(
                    function = %name,
                    state = %machine.state(),
                    error = %err,
                    "Deploy did not succeed"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        machine: &mut DeployStateMachine,
        source: &Path,
    ) -> CumulusResult<DeployResult> {
        let name = machine.function_name().clone();

        machine.transition_to(DeployState::Packaging)?;
        let package = build_package(source).await?;
        tracing::info!(
            function = %name,
            digest = %package.digest(),
            bytes = package.len(),
            entries = package.entries().len(),
            "Packaged source"
        );

        machine.transition_to(DeployState::Uploading)?;
        let location = PackageLocation {
            store: self.config.store.clone(),
            key: name.package_key(),
        };
        self.blobs
            .put_object(&location.store, &location.key, package.bytes().clone())
            .await?;
        tracing::info!(function = %name, store = %location.store, key = %location.key, "Uploaded package");

        let definition = FunctionDefinition::new(name.clone(), location.clone())
            .with_log_retention(self.config.log_retention);

        machine.transition_to(DeployState::AttemptingCreate)?;
        let handle = match self.registry.create_function(&definition).await {
            CreateOutcome::Created(handle) => handle,
            CreateOutcome::AlreadyExists => {
                tracing::info!(function = %name, "Function exists, updating");
                machine.transition_to(DeployState::AttemptingUpdate)?;
                self.registry.update_function(&definition).await?
            }
            CreateOutcome::Rejected(err) => return Err(err.into()),
        };

        machine.transition_to(DeployState::Polling)?;
        let polls = self.wait_for(&handle).await?;
        machine.transition_to(DeployState::Succeeded)?;

        let outcome = DeployOutcome::from(handle.kind);
        tracing::info!(
            function = %name,
            outcome = %outcome,
            polls,
            elapsed_ms = machine.elapsed().as_millis() as u64,
            "Deploy succeeded"
        );

        Ok(DeployResult {
            name,
            outcome,
            package: location,
            digest: package.digest().to_string(),
            package_size: package.len(),
            polls,
            elapsed: machine.elapsed(),
            states: machine.history().to_vec(),
        })
    }

    /// Poll `handle` until it finishes, returning the number of status calls.
    async fn wait_for(&self, handle: &OperationHandle) -> CumulusResult<u32> {
        let start = Instant::now();
        let deadline = start + self.config.max_wait;
        let loop_start = std::time::Instant::now();
        let mut polls = 0u32;

        let timed_out = |start: Instant| CumulusError::DeploymentTimeout {
            name: handle.name.clone(),
            kind: handle.kind,
            waited: start.elapsed(),
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(start));
            }

            // A hung status call must not outlive the wait budget.
            let status =
                match tokio::time::timeout(remaining, self.registry.get_operation_status(handle))
                    .await
                {
                    Ok(status) => status?,
                    Err(_) => return Err(timed_out(start)),
                };
            polls += 1;

            tracing::debug!(
                function = %handle.name,
                kind = %handle.kind,
                operation_id = %handle.id,
                polls,
                status = ?status,
                "Polled operation"
            );

            match status {
                OperationStatus::Succeeded => return Ok(polls),
                OperationStatus::Failed { detail } => {
                    return Err(CumulusError::DeploymentFailed {
                        name: handle.name.clone(),
                        kind: handle.kind,
                        detail,
                    })
                }
                OperationStatus::Pending => {}
            }

            let delay = self.backoff.wait_period(loop_start, polls);
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(delay.min(remaining)).await;
        }
    }

    /// Invoke a deployed function with an opaque payload.
    pub async fn invoke(&self, name: &FunctionName, payload: Bytes) -> CumulusResult<Invocation> {
        let invocation = self.registry.invoke_function(name, payload).await?;
        tracing::info!(
            function = %name,
            response_bytes = invocation.response_payload.len(),
            "Invoked function"
        );
        Ok(invocation)
    }

    /// Delete a deployed function. The uploaded package is left in place.
    pub async fn delete(&self, name: &FunctionName) -> CumulusResult<()> {
        self.registry.delete_function(name).await?;
        tracing::info!(function = %name, "Deleted function");
        Ok(())
    }
}
