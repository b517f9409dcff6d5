// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Blob store client seam.
//!
//! The orchestrator writes packages through [`BlobStore`]; the HTTP
//! implementation lives in [`crate::http`]. [`MemoryBlobStore`] keeps objects
//! in a process-local map for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::types::{ObjectKey, StoreId};

/// Upload-by-key access to a blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        store: &StoreId,
        key: &ObjectKey,
        bytes: Bytes,
    ) -> Result<(), StoreError>;
}

/// Type alias for a shared BlobStore.
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Thread-safe in-memory blob store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<HashMap<(StoreId, ObjectKey), Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, store: &StoreId, key: &ObjectKey) -> Option<Bytes> {
        let lock = self.data.read().unwrap_or_else(|e| e.into_inner());
        lock.get(&(store.clone(), key.clone())).cloned()
    }

    pub fn contains(&self, store: &StoreId, key: &ObjectKey) -> bool {
        let lock = self.data.read().unwrap_or_else(|e| e.into_inner());
        lock.contains_key(&(store.clone(), key.clone()))
    }

    pub fn delete(&self, store: &StoreId, key: &ObjectKey) {
        let mut lock = self.data.write().unwrap_or_else(|e| e.into_inner());
        lock.remove(&(store.clone(), key.clone()));
    }

    /// Number of stored objects across all stores.
    pub fn len(&self) -> usize {
        let lock = self.data.read().unwrap_or_else(|e| e.into_inner());
        lock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(
        &self,
        store: &StoreId,
        key: &ObjectKey,
        bytes: Bytes,
    ) -> Result<(), StoreError> {
        let mut lock = self.data.write().unwrap_or_else(|e| e.into_inner());
        lock.insert((store.clone(), key.clone()), bytes);
        tracing::debug!(store = %store, key = %key, "stored object in memory");
        Ok(())
    }
}
