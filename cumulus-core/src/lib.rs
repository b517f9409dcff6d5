//! Cumulus Core Library
//!
//! Idempotent deployment of packaged functions to a hosting service.
//! Provides deterministic packaging, blob store and function registry
//! clients, the create-or-update orchestrator, and configuration parsing.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod orchestrator;
pub mod package;
pub mod polling;
pub mod registry;
pub mod state;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::{ApiKey, ClientConfig, Config, ConfigLoader, DeployConfig};
pub use error::{
    ConfigurationError, CumulusError, CumulusResult, PackagingError, RegistryError, StoreError,
};
pub use handler::{Greeter, Handler, HandlerOutput};
pub use http::{HttpBlobStore, HttpFunctionRegistry};
pub use orchestrator::{DeployOutcome, DeployResult, Deployer};
pub use package::{build_package, DeploymentPackage};
pub use polling::{ExponentialBackoff, ExponentialBackoffBuilder, FixedInterval, PollingBackoffPolicy};
pub use registry::{
    CreateOutcome, FunctionRegistry, Invocation, MemoryRegistry, OperationHandle, OperationKind,
    OperationStatus, SharedFunctionRegistry,
};
pub use state::{DeployState, DeployStateMachine, FunctionState};
pub use storage::{BlobStore, MemoryBlobStore, SharedBlobStore};
pub use types::{FunctionDefinition, FunctionName, LogRetention, ObjectKey, PackageLocation, StoreId};
