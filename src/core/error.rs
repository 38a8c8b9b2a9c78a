use thiserror::Error;

use super::types::EntityKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Validation failed for {kind} '{key}': {message}")]
    Validation {
        kind: EntityKind,
        key: String,
        message: String,
    },

    #[error("{kind} '{key}' already exists")]
    Duplicate { kind: EntityKind, key: String },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("Optimistic lock conflict for {kind} '{key}': expected version {expected}, actual {actual}")]
    Conflict {
        kind: EntityKind,
        key: String,
        expected: i64,
        actual: i64,
    },

    #[error("Stale write: {kind} '{key}' has unsaved changes")]
    StaleWrite { kind: EntityKind, key: String },

    #[error("Attribute '{attribute}' of {kind} is read-only")]
    ReadOnlyAttribute {
        kind: EntityKind,
        attribute: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// True when the error means the store rejected (or never received) the
    /// primary write. These are the only errors a save reports to its caller.
    pub fn is_primary_write(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Duplicate { .. }
                | Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::Storage(_)
                | Self::Serialization(_)
        )
    }

    pub fn is_stale_write(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
