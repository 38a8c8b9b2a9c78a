use crate::core::{EntityKind, RecordMeta, RegistryError, Result};
use crate::model::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A record as the store keeps it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: EntityKind,
    pub key: String,
    /// Optimistic locking version, starts at 1 and grows with every update
    pub version: i64,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity store trait - the authoritative persistence of registry records.
///
/// Every method either commits durably or fails; there is no partial write.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create a record. Fails with `Duplicate` if the key is taken.
    async fn create(
        &self,
        kind: EntityKind,
        key: &str,
        fields: serde_json::Value,
    ) -> Result<StoredRecord>;

    /// Replace a record's fields. Fails with `Conflict` if the stored version
    /// is not `expected_version`.
    async fn update(
        &self,
        kind: EntityKind,
        key: &str,
        expected_version: i64,
        fields: serde_json::Value,
    ) -> Result<StoredRecord>;

    async fn fetch(&self, kind: EntityKind, key: &str) -> Result<Option<StoredRecord>>;

    async fn delete(&self, kind: EntityKind, key: &str) -> Result<bool>;

    /// List all keys of a kind, sorted
    async fn list_keys(&self, kind: EntityKind) -> Result<Vec<String>>;

    /// Check whether a key is already taken
    async fn find_existing(&self, kind: EntityKind, key: &str) -> Result<bool> {
        Ok(self.fetch(kind, key).await?.is_some())
    }
}

/// Writes `record` through the store: create when it has never been
/// committed, versioned update otherwise.
pub async fn write_record<R: Record>(store: &dyn EntityStore, record: &R) -> Result<StoredRecord> {
    let fields = serde_json::to_value(record)?;
    match record.meta().version() {
        None => store.create(R::KIND, record.key(), fields).await,
        Some(version) => store.update(R::KIND, record.key(), version, fields).await,
    }
}

/// Reads a record back. Loaded records are READY and their relations
/// COMMITTED.
pub async fn load_record<R: Record>(store: &dyn EntityStore, key: &str) -> Result<Option<R>> {
    let Some(stored) = store.fetch(R::KIND, key).await? else {
        return Ok(None);
    };

    let mut record: R = serde_json::from_value(stored.fields).map_err(|e| {
        RegistryError::Serialization(format!("Stored {} '{}' is unreadable: {}", R::KIND, key, e))
    })?;
    *record.meta_mut() = RecordMeta::loaded(stored.version, stored.updated_at);
    Ok(Some(record))
}
