use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of record kept in the global registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    User,
    DatabaseServer,
    Extension,
    GlobalPrivilege,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::User => "user",
            EntityKind::DatabaseServer => "database_server",
            EntityKind::Extension => "extension",
            EntityKind::GlobalPrivilege => "global_privilege",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a record held by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityStatus {
    /// Never written to the store
    New,
    /// In sync with the last committed version
    Ready,
    /// Locally modified since the last commit
    Dirty,
    /// The last primary write was rejected
    Error,
}

impl EntityStatus {
    /// Whether a save may be initiated from this status
    #[inline]
    pub fn is_saveable(&self) -> bool {
        matches!(self, EntityStatus::New | EntityStatus::Dirty)
    }
}

/// Lifecycle of a relation nested inside a record (extension attachment,
/// organization membership). Independent of the owning record's status.
///
/// Relations read back from the store are committed, so that is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelationStatus {
    New,
    #[default]
    Committed,
}

/// Client-side bookkeeping for a record. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    status: EntityStatus,
    /// Version of the last committed write (optimistic locking)
    version: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
    pub fn new() -> Self {
        Self {
            status: EntityStatus::New,
            version: None,
            updated_at: None,
        }
    }

    /// Metadata for a record freshly read from the store
    pub fn loaded(version: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            status: EntityStatus::Ready,
            version: Some(version),
            updated_at: Some(updated_at),
        }
    }

    pub fn status(&self) -> EntityStatus {
        self.status
    }

    pub fn version(&self) -> Option<i64> {
        self.version
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether the record has ever been committed
    pub fn is_persisted(&self) -> bool {
        self.version.is_some()
    }

    pub fn is_new(&self) -> bool {
        self.status == EntityStatus::New
    }

    /// Records a local modification.
    pub fn touch(&mut self) {
        self.status = match self.status {
            EntityStatus::New => EntityStatus::New,
            EntityStatus::Ready | EntityStatus::Dirty => EntityStatus::Dirty,
            EntityStatus::Error => self.unsaved_status(),
        };
    }

    /// Leaves the error status so the record can be saved again.
    pub fn recover(&mut self) {
        if self.status == EntityStatus::Error {
            self.status = self.unsaved_status();
        }
    }

    pub(crate) fn committed(&mut self, version: i64, updated_at: DateTime<Utc>) {
        self.status = EntityStatus::Ready;
        self.version = Some(version);
        self.updated_at = Some(updated_at);
    }

    pub(crate) fn failed(&mut self) {
        self.status = EntityStatus::Error;
    }

    fn unsaved_status(&self) -> EntityStatus {
        if self.is_persisted() {
            EntityStatus::Dirty
        } else {
            EntityStatus::New
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_transitions() {
        let mut meta = RecordMeta::new();
        meta.touch();
        assert_eq!(meta.status(), EntityStatus::New);

        meta.committed(1, Utc::now());
        assert_eq!(meta.status(), EntityStatus::Ready);
        meta.touch();
        assert_eq!(meta.status(), EntityStatus::Dirty);
    }

    #[test]
    fn test_recover_after_failure() {
        let mut meta = RecordMeta::new();
        meta.failed();
        assert!(!meta.status().is_saveable());
        meta.recover();
        assert_eq!(meta.status(), EntityStatus::New);

        let mut meta = RecordMeta::loaded(3, Utc::now());
        meta.failed();
        meta.touch();
        assert_eq!(meta.status(), EntityStatus::Dirty);
    }

    #[test]
    fn test_relation_default_is_committed() {
        assert_eq!(RelationStatus::default(), RelationStatus::Committed);
    }
}
