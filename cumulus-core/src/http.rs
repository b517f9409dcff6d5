// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! REST clients for the blob store and the function registry.
//!
//! Both clients authenticate with a bearer token and map HTTP status codes
//! onto the typed collaborator errors. A create answered with 409 is the only
//! response turned into a non-error outcome.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{RegistryError, StoreError};
use crate::registry::{
    CreateOutcome, FunctionRegistry, Invocation, OperationHandle, OperationKind, OperationStatus,
};
use crate::storage::BlobStore;
use crate::types::{FunctionDefinition, FunctionName, ObjectKey, StoreId};

/// Header carrying the configured region.
pub const REGION_HEADER: &str = "x-cumulus-region";

fn build_client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("cumulus/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Read the body of a failed response for error messages.
async fn error_message(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => "no response body".to_string(),
        Err(e) => format!("failed to read response body: {}", e),
    }
}

/// Map a non-success registry status onto a [`RegistryError`].
pub(crate) fn registry_error(
    status: StatusCode,
    name: &FunctionName,
    message: String,
) -> RegistryError {
    match status.as_u16() {
        409 => RegistryError::Conflict { name: name.clone() },
        400 | 422 => RegistryError::Validation { message },
        401 | 403 => RegistryError::Auth { message },
        404 => RegistryError::NotFound { name: name.clone() },
        status => RegistryError::Service { status, message },
    }
}

/// Map a non-success blob store status onto a [`StoreError`].
pub(crate) fn store_error(
    status: StatusCode,
    store: &StoreId,
    key: &ObjectKey,
    message: String,
) -> StoreError {
    match status.as_u16() {
        401 | 403 => StoreError::Auth {
            store: store.to_string(),
            key: key.to_string(),
            message,
        },
        status => StoreError::Service { status, message },
    }
}

// =============================================================================
// Blob store
// =============================================================================

/// Blob store client: `PUT {storage}/stores/{store}/objects/{key}`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBlobStore {
    pub fn new(config: ClientConfig) -> Result<Self, StoreError> {
        let client = build_client(&config).map_err(|e| StoreError::Transport {
            message: format!("building HTTP client: {}", e),
        })?;
        Ok(Self { client, config })
    }

    fn object_url(&self, store: &StoreId, key: &ObjectKey) -> String {
        format!(
            "{}/stores/{}/objects/{}",
            self.config.storage_endpoint, store, key
        )
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put_object(
        &self,
        store: &StoreId,
        key: &ObjectKey,
        bytes: Bytes,
    ) -> Result<(), StoreError> {
        let size = bytes.len();
        let response = self
            .client
            .put(self.object_url(store, key))
            .bearer_auth(self.config.api_key.expose())
            .header(REGION_HEADER, &self.config.region)
            .header("Content-Type", "application/gzip")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StoreError::Transport {
                message: format!("PUT {}/{}: {}", store, key, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(store_error(status, store, key, message));
        }

        tracing::debug!(store = %store, key = %key, bytes = size, "uploaded object");
        Ok(())
    }
}

// =============================================================================
// Function registry
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvocationResponse {
    #[serde(default)]
    response_payload: String,
    #[serde(default)]
    invocation_logs: String,
}

/// Function registry client for the `{api}/functions` resource.
#[derive(Debug, Clone)]
pub struct HttpFunctionRegistry {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpFunctionRegistry {
    pub fn new(config: ClientConfig) -> Result<Self, RegistryError> {
        let client = build_client(&config).map_err(|e| RegistryError::Transport {
            message: format!("building HTTP client: {}", e),
        })?;
        Ok(Self { client, config })
    }

    fn functions_url(&self) -> String {
        format!("{}/functions", self.config.endpoint)
    }

    fn function_url(&self, name: &FunctionName) -> String {
        format!("{}/functions/{}", self.config.endpoint, name)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.config.api_key.expose())
            .header(REGION_HEADER, &self.config.region)
    }

    /// Send `request`, returning the response only if it succeeded.
    async fn send(
        &self,
        request: RequestBuilder,
        name: &FunctionName,
    ) -> Result<reqwest::Response, RegistryError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RegistryError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = error_message(response).await;
            Err(registry_error(status, name, message))
        }
    }
}

#[async_trait]
impl FunctionRegistry for HttpFunctionRegistry {
    async fn create_function(&self, definition: &FunctionDefinition) -> CreateOutcome {
        let request = self.client.post(self.functions_url()).json(definition);
        match self.send(request, &definition.name).await {
            Ok(_) => CreateOutcome::Created(OperationHandle::new(
                OperationKind::Create,
                definition.name.clone(),
            )),
            Err(RegistryError::Conflict { .. }) => CreateOutcome::AlreadyExists,
            Err(e) => CreateOutcome::Rejected(e),
        }
    }

    async fn update_function(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<OperationHandle, RegistryError> {
        let request = self
            .client
            .put(self.function_url(&definition.name))
            .json(definition);
        self.send(request, &definition.name).await?;
        Ok(OperationHandle::new(
            OperationKind::Update,
            definition.name.clone(),
        ))
    }

    async fn get_operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, RegistryError> {
        let request = self.client.get(self.function_url(&handle.name));
        let response = self.send(request, &handle.name).await?;
        let body: StatusResponse = response.json().await.map_err(|e| RegistryError::Decode {
            message: format!("status of {}: {}", handle.name, e),
        })?;

        match body.status.as_str() {
            "pending" => Ok(OperationStatus::Pending),
            "active" => Ok(OperationStatus::Succeeded),
            "failed" => Ok(OperationStatus::Failed {
                detail: body
                    .status_detail
                    .unwrap_or_else(|| "no detail reported".to_string()),
            }),
            other => Err(RegistryError::Decode {
                message: format!("unknown function status '{}'", other),
            }),
        }
    }

    async fn delete_function(&self, name: &FunctionName) -> Result<(), RegistryError> {
        let request = self.client.delete(self.function_url(name));
        self.send(request, name).await?;
        tracing::debug!(function = %name, "delete accepted");
        Ok(())
    }

    async fn invoke_function(
        &self,
        name: &FunctionName,
        payload: Bytes,
    ) -> Result<Invocation, RegistryError> {
        let request = self
            .client
            .post(format!("{}/invocations", self.function_url(name)))
            .header("Content-Type", "application/json")
            .body(payload);
        let response = self.send(request, name).await?;
        let body: InvocationResponse =
            response.json().await.map_err(|e| RegistryError::Decode {
                message: format!("invocation of {}: {}", name, e),
            })?;

        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map(Bytes::from)
                .map_err(|e| RegistryError::Decode {
                    message: format!("{} is not valid base64: {}", field, e),
                })
        };

        Ok(Invocation {
            response_payload: decode("responsePayload", &body.response_payload)?,
            invocation_log: decode("invocationLogs", &body.invocation_logs)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> FunctionName {
        FunctionName::new("greet").unwrap()
    }

    #[test]
    fn test_registry_status_mapping() {
        let map = |code: u16| {
            registry_error(
                StatusCode::from_u16(code).unwrap(),
                &name(),
                "body".to_string(),
            )
        };

        assert!(matches!(map(409), RegistryError::Conflict { .. }));
        assert!(matches!(map(400), RegistryError::Validation { .. }));
        assert!(matches!(map(422), RegistryError::Validation { .. }));
        assert!(matches!(map(401), RegistryError::Auth { .. }));
        assert!(matches!(map(403), RegistryError::Auth { .. }));
        assert!(matches!(map(404), RegistryError::NotFound { .. }));
        assert!(matches!(
            map(503),
            RegistryError::Service { status: 503, .. }
        ));
    }

    #[test]
    fn test_conflict_detected_by_status_only() {
        // A 500 whose body talks about conflicts is still a service error.
        let err = registry_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &name(),
            "ResourceConflictException: function already exists".to_string(),
        );
        assert!(matches!(err, RegistryError::Service { status: 500, .. }));
    }

    #[test]
    fn test_store_status_mapping() {
        let store = StoreId::new("artifacts").unwrap();
        let key = ObjectKey::new("greet.tar.gz").unwrap();

        let err = store_error(StatusCode::FORBIDDEN, &store, &key, "denied".to_string());
        assert!(matches!(err, StoreError::Auth { .. }));
        assert!(err.to_string().contains("artifacts/greet.tar.gz"));

        let err = store_error(StatusCode::BAD_GATEWAY, &store, &key, "down".to_string());
        assert!(matches!(err, StoreError::Service { status: 502, .. }));
    }
}
