// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Maximum length of a function name.
const MAX_FUNCTION_NAME_LEN: usize = 64;
/// Maximum length of a store identifier.
const MAX_STORE_ID_LEN: usize = 63;
/// Longest log retention the registry accepts: ten years.
const MAX_LOG_RETENTION_DAYS: u32 = 3650;

/// File extension of uploaded deployment packages.
pub const PACKAGE_EXTENSION: &str = "tar.gz";

/// Validated function name.
/// Must be non-empty, ASCII alphanumeric with hyphens/underscores, max 64 chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionName(String);

impl FunctionName {
    /// Create a new FunctionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "function_name",
                value: name,
                reason: "Function name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_FUNCTION_NAME_LEN {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "function_name",
                value: name.clone(),
                reason: format!(
                    "Function name too long: {} chars (max {})",
                    name.len(),
                    MAX_FUNCTION_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "function_name",
                value: name,
                reason: "Function name must contain only ASCII alphanumeric characters, hyphens, and underscores".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The object key this function's package is uploaded under.
    pub fn package_key(&self) -> ObjectKey {
        // Function names never contain '/' or "..", so the derived key is always valid.
        ObjectKey(format!("{}.{}", self.0, PACKAGE_EXTENSION))
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FunctionName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FunctionName> for String {
    fn from(name: FunctionName) -> Self {
        name.0
    }
}

/// Validated blob store identifier (bucket name).
/// Lowercase alphanumerics, hyphens and dots, max 63 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigurationError> {
        let id = id.into();

        if id.is_empty() || id.len() > MAX_STORE_ID_LEN {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "store",
                value: id,
                reason: format!("Store id must be 1 to {} characters", MAX_STORE_ID_LEN),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "store",
                value: id,
                reason: "Store id must contain only lowercase letters, digits, hyphens, and dots"
                    .to_string(),
            });
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StoreId {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoreId> for String {
    fn from(id: StoreId) -> Self {
        id.0
    }
}

/// Validated object key inside a store.
/// Must be non-empty, relative, and free of `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigurationError> {
        let key = key.into();

        if key.is_empty() {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "key",
                value: key,
                reason: "Object key cannot be empty".to_string(),
            });
        }

        if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "key",
                value: key,
                reason: "Object key must be relative and must not contain '..'".to_string(),
            });
        }

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

/// Reference to an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageLocation {
    pub store: StoreId,
    pub key: ObjectKey,
}

impl fmt::Display for PackageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.key)
    }
}

/// Validated log retention period in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LogRetention(u32);

impl LogRetention {
    pub fn from_days(days: u32) -> Result<Self, ConfigurationError> {
        if !(1..=MAX_LOG_RETENTION_DAYS).contains(&days) {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "log_retention_days",
                value: days.to_string(),
                reason: format!("Must be between 1 and {} days", MAX_LOG_RETENTION_DAYS),
            });
        }
        Ok(Self(days))
    }

    pub fn days(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LogRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

impl TryFrom<u32> for LogRetention {
    type Error = ConfigurationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_days(value)
    }
}

impl From<LogRetention> for u32 {
    fn from(retention: LogRetention) -> Self {
        retention.0
    }
}

/// A deployable unit as the registry sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    #[serde(rename = "functionName")]
    pub name: FunctionName,
    #[serde(rename = "packageLocation")]
    pub package: PackageLocation,
    #[serde(
        rename = "logRetentionDays",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub log_retention: Option<LogRetention>,
}

impl FunctionDefinition {
    pub fn new(name: FunctionName, package: PackageLocation) -> Self {
        Self {
            name,
            package,
            log_retention: None,
        }
    }

    pub fn with_log_retention(mut self, retention: Option<LogRetention>) -> Self {
        self.log_retention = retention;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name_valid() {
        assert!(FunctionName::new("simple-function").is_ok());
        assert!(FunctionName::new("greet_2").is_ok());
        assert!(FunctionName::new("Greet").is_ok());
    }

    #[test]
    fn test_function_name_invalid() {
        assert!(FunctionName::new("").is_err());
        assert!(FunctionName::new("a".repeat(65)).is_err());
        assert!(FunctionName::new("func/name").is_err());
        assert!(FunctionName::new("func name").is_err());
        assert!(FunctionName::new("grüß").is_err());
    }

    #[test]
    fn test_package_key_is_derived_from_name() {
        let name = FunctionName::new("greet").unwrap();
        assert_eq!(name.package_key().as_str(), "greet.tar.gz");
        assert_eq!(name.package_key(), name.package_key());
    }

    #[test]
    fn test_store_id() {
        assert!(StoreId::new("my-bucket.v2").is_ok());
        assert!(StoreId::new("").is_err());
        assert!(StoreId::new("Upper").is_err());
        assert!(StoreId::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_object_key() {
        assert!(ObjectKey::new("functions/greet.tar.gz").is_ok());
        assert!(ObjectKey::new("").is_err());
        assert!(ObjectKey::new("/abs").is_err());
        assert!(ObjectKey::new("a/../b").is_err());
    }

    #[test]
    fn test_log_retention_bounds() {
        assert!(LogRetention::from_days(1).is_ok());
        assert!(LogRetention::from_days(3650).is_ok());
        assert!(LogRetention::from_days(0).is_err());
        assert!(LogRetention::from_days(3651).is_err());
    }

    #[test]
    fn test_definition_wire_shape() {
        let def = FunctionDefinition::new(
            FunctionName::new("greet").unwrap(),
            PackageLocation {
                store: StoreId::new("artifacts").unwrap(),
                key: ObjectKey::new("greet.tar.gz").unwrap(),
            },
        )
        .with_log_retention(Some(LogRetention::from_days(7).unwrap()));

        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["functionName"], "greet");
        assert_eq!(json["packageLocation"]["store"], "artifacts");
        assert_eq!(json["packageLocation"]["key"], "greet.tar.gz");
        assert_eq!(json["logRetentionDays"], 7);

        let without = FunctionDefinition::new(def.name.clone(), def.package.clone());
        let json = serde_json::to_value(&without).unwrap();
        assert!(json.get("logRetentionDays").is_none());
    }
}
