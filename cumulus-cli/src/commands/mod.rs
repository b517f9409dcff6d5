// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use std::path::Path;
use std::sync::Arc;

use cumulus_core::{Config, ConfigLoader, Deployer, HttpBlobStore, HttpFunctionRegistry};

pub mod delete;
pub mod deploy;
pub mod invoke;
pub mod package;
pub mod validate;

/// Load and validate configuration - fail fast before any network call.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    tracing::debug!(
        endpoint = %config.client.endpoint,
        store = %config.deploy.store,
        "Configuration loaded"
    );
    Ok(config)
}

/// Build a deployer talking to the configured service.
pub fn connect(config: Config) -> Result<Deployer, Box<dyn std::error::Error>> {
    let blobs = HttpBlobStore::new(config.client.clone())?;
    let registry = HttpFunctionRegistry::new(config.client)?;
    Ok(Deployer::new(config.deploy, Arc::new(blobs), Arc::new(registry)))
}
