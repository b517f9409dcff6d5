//! Function registry client seam and an in-memory registry.
//!
//! [`FunctionRegistry`] abstracts the hosting service's control plane. The
//! HTTP implementation lives in [`crate::http`]; [`MemoryRegistry`] keeps
//! definitions in a DashMap and runs statically registered [`Handler`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::handler::Handler;
use crate::state::FunctionState;
use crate::storage::MemoryBlobStore;
use crate::types::{FunctionDefinition, FunctionName};

/// Which registry call started an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
}

impl OperationKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An in-flight create or update.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    /// Client-side correlation id, logged with every poll.
    pub id: Uuid,
    pub kind: OperationKind,
    pub name: FunctionName,
}

impl OperationHandle {
    pub fn new(kind: OperationKind, name: FunctionName) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name,
        }
    }
}

/// Registry view of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed { detail: String },
}

/// Result of asking the registry to create a function.
///
/// "Already exists" is an expected answer, not an error.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(OperationHandle),
    AlreadyExists,
    Rejected(RegistryError),
}

/// Response of a synchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub response_payload: Bytes,
    pub invocation_log: Bytes,
}

/// Control-plane access to the function hosting service.
#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    async fn create_function(&self, definition: &FunctionDefinition) -> CreateOutcome;

    async fn update_function(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<OperationHandle, RegistryError>;

    async fn get_operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, RegistryError>;

    async fn delete_function(&self, name: &FunctionName) -> Result<(), RegistryError>;

    /// Call the function and wait for its response. The payload is opaque.
    async fn invoke_function(
        &self,
        name: &FunctionName,
        payload: Bytes,
    ) -> Result<Invocation, RegistryError>;
}

/// Type alias for a shared FunctionRegistry.
pub type SharedFunctionRegistry = Arc<dyn FunctionRegistry>;

/// Entry in the in-memory registry.
#[derive(Debug)]
struct FunctionEntry {
    definition: FunctionDefinition,
    state: FunctionState,
    /// Status polls left before a pending operation settles.
    polls_remaining: u32,
    /// Set when the pending operation should settle as failed.
    failure: Option<String>,
}

/// In-memory registry.
///
/// Creates and updates start pending and settle after a configurable number
/// of status polls. When a blob store is attached, definitions whose package
/// is missing are rejected as validation errors.
pub struct MemoryRegistry {
    functions: DashMap<FunctionName, FunctionEntry>,
    handlers: HashMap<FunctionName, Arc<dyn Handler>>,
    blobs: Option<MemoryBlobStore>,
    settle_after_polls: u32,
    pending_failures: DashMap<FunctionName, String>,
}

impl MemoryRegistry {
    /// Create a new empty registry whose operations settle on the first poll.
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
            handlers: HashMap::new(),
            blobs: None,
            settle_after_polls: 1,
            pending_failures: DashMap::new(),
        }
    }

    /// Serve invocations of `name` with `handler`.
    pub fn with_handler(mut self, name: FunctionName, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Check that packages exist in `blobs` before accepting a definition.
    pub fn with_blob_store(mut self, blobs: MemoryBlobStore) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Number of status polls an operation stays pending, at least one.
    pub fn with_settle_after_polls(mut self, polls: u32) -> Self {
        self.settle_after_polls = polls.max(1);
        self
    }

    /// Make the next create or update of `name` settle as failed.
    pub fn fail_next_operation(&self, name: FunctionName, detail: impl Into<String>) {
        self.pending_failures.insert(name, detail.into());
    }

    /// Create a registry wrapped in an Arc for sharing across tasks.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn contains(&self, name: &FunctionName) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get_state(&self, name: &FunctionName) -> Option<FunctionState> {
        self.functions.get(name).map(|entry| entry.state)
    }

    pub fn get_definition(&self, name: &FunctionName) -> Option<FunctionDefinition> {
        self.functions.get(name).map(|entry| entry.definition.clone())
    }

    fn check_package(&self, definition: &FunctionDefinition) -> Result<(), RegistryError> {
        match &self.blobs {
            Some(blobs) if !blobs.contains(&definition.package.store, &definition.package.key) => {
                Err(RegistryError::Validation {
                    message: format!("package {} does not exist", definition.package),
                })
            }
            _ => Ok(()),
        }
    }

    fn take_failure(&self, name: &FunctionName) -> Option<String> {
        self.pending_failures.remove(name).map(|(_, detail)| detail)
    }

    fn new_entry(&self, definition: FunctionDefinition) -> FunctionEntry {
        FunctionEntry {
            failure: self.take_failure(&definition.name),
            definition,
            state: FunctionState::Pending,
            polls_remaining: self.settle_after_polls,
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionRegistry for MemoryRegistry {
    async fn create_function(&self, definition: &FunctionDefinition) -> CreateOutcome {
        if let Err(e) = self.check_package(definition) {
            return CreateOutcome::Rejected(e);
        }

        match self.functions.entry(definition.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => CreateOutcome::AlreadyExists,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(self.new_entry(definition.clone()));
                CreateOutcome::Created(OperationHandle::new(
                    OperationKind::Create,
                    definition.name.clone(),
                ))
            }
        }
    }

    async fn update_function(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<OperationHandle, RegistryError> {
        self.check_package(definition)?;

        let mut entry =
            self.functions
                .get_mut(&definition.name)
                .ok_or_else(|| RegistryError::NotFound {
                    name: definition.name.clone(),
                })?;

        // Only one operation may be in flight per function.
        entry
            .state
            .transition_to(&definition.name, FunctionState::Pending)
            .map_err(|_| RegistryError::Conflict {
                name: definition.name.clone(),
            })?;
        entry.definition = definition.clone();
        entry.polls_remaining = self.settle_after_polls;
        entry.failure = self.take_failure(&definition.name);

        Ok(OperationHandle::new(
            OperationKind::Update,
            definition.name.clone(),
        ))
    }

    async fn get_operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, RegistryError> {
        let mut entry =
            self.functions
                .get_mut(&handle.name)
                .ok_or_else(|| RegistryError::NotFound {
                    name: handle.name.clone(),
                })?;

        if entry.state == FunctionState::Pending {
            entry.polls_remaining = entry.polls_remaining.saturating_sub(1);
            if entry.polls_remaining == 0 {
                let settled = if entry.failure.is_some() {
                    FunctionState::Failed
                } else {
                    FunctionState::Active
                };
                entry
                    .state
                    .transition_to(&handle.name, settled)
                    .map_err(|e| RegistryError::Service {
                        status: 500,
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(match entry.state {
            FunctionState::Pending => OperationStatus::Pending,
            FunctionState::Active => OperationStatus::Succeeded,
            FunctionState::Failed => OperationStatus::Failed {
                detail: entry
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            },
        })
    }

    async fn delete_function(&self, name: &FunctionName) -> Result<(), RegistryError> {
        self.functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound { name: name.clone() })
    }

    async fn invoke_function(
        &self,
        name: &FunctionName,
        payload: Bytes,
    ) -> Result<Invocation, RegistryError> {
        let state = self
            .get_state(name)
            .ok_or_else(|| RegistryError::NotFound { name: name.clone() })?;

        if !state.is_invokable() {
            return Err(RegistryError::Validation {
                message: format!("function {} is {} and cannot be invoked", name, state),
            });
        }

        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| RegistryError::Service {
                status: 502,
                message: format!("no runtime handler registered for {}", name),
            })?;

        let event: Option<serde_json::Value> = if payload.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice(&payload).map_err(|e| RegistryError::Validation {
                    message: format!("request payload is not JSON: {}", e),
                })?,
            )
        };

        let output = handler.handle(event.as_ref());
        let response_payload = serde_json::to_vec(&output.value).map_err(|e| {
            RegistryError::Decode {
                message: format!("handler output is not serialisable: {}", e),
            }
        })?;

        let mut log = String::new();
        for line in &output.log {
            log.push_str(line);
            log.push('\n');
        }

        Ok(Invocation {
            response_payload: Bytes::from(response_payload),
            invocation_log: Bytes::from(log),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Greeter;
    use crate::types::{ObjectKey, PackageLocation, StoreId};

    fn make_definition(name: &str) -> FunctionDefinition {
        let name = FunctionName::new(name).unwrap();
        FunctionDefinition::new(
            name.clone(),
            PackageLocation {
                store: StoreId::new("artifacts").unwrap(),
                key: name.package_key(),
            },
        )
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let registry = MemoryRegistry::new();
        let def = make_definition("test-func");

        assert!(matches!(
            registry.create_function(&def).await,
            CreateOutcome::Created(_)
        ));
        assert!(matches!(
            registry.create_function(&def).await,
            CreateOutcome::AlreadyExists
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_operation_settles_after_polls() {
        let registry = MemoryRegistry::new().with_settle_after_polls(3);
        let def = make_definition("test-func");

        let handle = match registry.create_function(&def).await {
            CreateOutcome::Created(handle) => handle,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(handle.kind, OperationKind::Create);

        assert_eq!(
            registry.get_operation_status(&handle).await.unwrap(),
            OperationStatus::Pending
        );
        assert_eq!(
            registry.get_operation_status(&handle).await.unwrap(),
            OperationStatus::Pending
        );
        assert_eq!(
            registry.get_operation_status(&handle).await.unwrap(),
            OperationStatus::Succeeded
        );
        assert_eq!(registry.get_state(&def.name), Some(FunctionState::Active));
    }

    #[tokio::test]
    async fn test_update_requires_existing_function() {
        let registry = MemoryRegistry::new();
        let def = make_definition("missing");

        let err = registry.update_function(&def).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_while_pending_conflicts() {
        let registry = MemoryRegistry::new();
        let def = make_definition("busy");
        registry.create_function(&def).await;

        let err = registry.update_function(&def).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_failed_operation_reports_detail() {
        let registry = MemoryRegistry::new();
        let def = make_definition("broken");
        registry.fail_next_operation(def.name.clone(), "handler not found in package");

        let handle = match registry.create_function(&def).await {
            CreateOutcome::Created(handle) => handle,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(
            registry.get_operation_status(&handle).await.unwrap(),
            OperationStatus::Failed {
                detail: "handler not found in package".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_update_after_failure_redeploys() {
        let registry = MemoryRegistry::new();
        let def = make_definition("broken");
        registry.fail_next_operation(def.name.clone(), "bad package");

        let handle = match registry.create_function(&def).await {
            CreateOutcome::Created(handle) => handle,
            other => panic!("unexpected outcome: {:?}", other),
        };
        registry.get_operation_status(&handle).await.unwrap();
        assert_eq!(registry.get_state(&def.name), Some(FunctionState::Failed));

        let fixed = def.clone().with_log_retention(Some(
            crate::types::LogRetention::from_days(3).unwrap(),
        ));
        let handle = registry.update_function(&fixed).await.unwrap();
        assert_eq!(registry.get_state(&def.name), Some(FunctionState::Pending));

        // A second update while the first is in flight leaves it untouched.
        assert!(matches!(
            registry.update_function(&def).await,
            Err(RegistryError::Conflict { .. })
        ));
        assert_eq!(registry.get_definition(&def.name), Some(fixed));

        assert_eq!(
            registry.get_operation_status(&handle).await.unwrap(),
            OperationStatus::Succeeded
        );
        assert_eq!(registry.get_state(&def.name), Some(FunctionState::Active));
    }

    #[tokio::test]
    async fn test_missing_package_is_rejected() {
        let registry = MemoryRegistry::new().with_blob_store(MemoryBlobStore::new());
        let def = make_definition("no-package");

        assert!(matches!(
            registry.create_function(&def).await,
            CreateOutcome::Rejected(RegistryError::Validation { .. })
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_runs_handler() {
        let name = FunctionName::new("greet").unwrap();
        let registry = MemoryRegistry::new().with_handler(name.clone(), Greeter);
        let def = make_definition("greet");

        let handle = match registry.create_function(&def).await {
            CreateOutcome::Created(handle) => handle,
            other => panic!("unexpected outcome: {:?}", other),
        };

        // Not invokable until the create settles
        let err = registry
            .invoke_function(&name, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));

        registry.get_operation_status(&handle).await.unwrap();

        let result = registry
            .invoke_function(&name, Bytes::from_static(br#"{"name":"Ada"}"#))
            .await
            .unwrap();
        let payload: String = serde_json::from_slice(&result.response_payload).unwrap();
        assert_eq!(payload, "Hello, Ada!");
        assert_eq!(result.invocation_log, Bytes::from_static(b"Hello, Ada!\n"));
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = MemoryRegistry::new();
        let def = make_definition("doomed");
        registry.create_function(&def).await;

        registry.delete_function(&def.name).await.unwrap();
        assert!(!registry.contains(&def.name));

        let err = registry.delete_function(&def.name).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_resource() {
        let registry = MemoryRegistry::new().into_shared();
        let def = make_definition("contended");

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let def = def.clone();
                tokio::spawn(async move { registry.create_function(&def).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if let CreateOutcome::Created(_) = task.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
    }
}
