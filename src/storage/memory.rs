use super::engine::{EntityStore, StoredRecord};
use crate::core::{EntityKind, RegistryError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

type RecordKey = (EntityKind, String);

/// In-memory entity store with optimistic version checks
///
/// # Examples
///
/// ```
/// use registrysync::{EntityKind, EntityStore, InMemoryEntityStore};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryEntityStore::new();
/// let stored = store
///     .create(EntityKind::Extension, "ext.a", json!({ "name": "ext.a" }))
///     .await
///     .unwrap();
/// assert_eq!(stored.version, 1);
///
/// // a stale version is rejected
/// assert!(store.update(EntityKind::Extension, "ext.a", 0, json!({})).await.is_err());
/// # });
/// ```
pub struct InMemoryEntityStore {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records of a kind
    pub async fn count(&self, kind: EntityKind) -> usize {
        let records = self.records.read().await;
        records.keys().filter(|(k, _)| *k == kind).count()
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create(
        &self,
        kind: EntityKind,
        key: &str,
        fields: serde_json::Value,
    ) -> Result<StoredRecord> {
        if key.is_empty() {
            return Err(RegistryError::Validation {
                kind,
                key: String::new(),
                message: "key cannot be empty".into(),
            });
        }

        let mut records = self.records.write().await;
        let record_key = (kind, key.to_string());
        if records.contains_key(&record_key) {
            return Err(RegistryError::Duplicate {
                kind,
                key: key.to_string(),
            });
        }

        let now = Utc::now();
        let stored = StoredRecord {
            kind,
            key: key.to_string(),
            version: 1,
            fields,
            created_at: now,
            updated_at: now,
        };
        records.insert(record_key, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        kind: EntityKind,
        key: &str,
        expected_version: i64,
        fields: serde_json::Value,
    ) -> Result<StoredRecord> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(&(kind, key.to_string()))
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                key: key.to_string(),
            })?;

        if existing.version != expected_version {
            return Err(RegistryError::Conflict {
                kind,
                key: key.to_string(),
                expected: expected_version,
                actual: existing.version,
            });
        }

        existing.version += 1;
        existing.fields = fields;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn fetch(&self, kind: EntityKind, key: &str) -> Result<Option<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&(kind, key.to_string())).cloned())
    }

    async fn delete(&self, kind: EntityKind, key: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&(kind, key.to_string())).is_some())
    }

    async fn list_keys(&self, kind: EntityKind) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut keys: Vec<String> = records
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
