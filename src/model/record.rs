use crate::core::{EntityKind, EntityStatus, RecordMeta, RegistryError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Attribute patch proposed alongside a save
pub type Changes = serde_json::Map<String, serde_json::Value>;

/// What the orchestrator needs to remember about a record before its
/// primary write. Relation statuses change once the write commits, so
/// anything derived from them has to be captured here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleSnapshot {
    Organization {
        key: String,
        was_new: bool,
        /// Extension ids of attachments that were NEW when the cycle began
        pending_extensions: Vec<String>,
    },
    User {
        key: String,
        was_new: bool,
        /// Organization keys of every membership
        organizations: Vec<String>,
    },
    Plain {
        kind: EntityKind,
        key: String,
        was_new: bool,
    },
}

impl CycleSnapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            CycleSnapshot::Organization { .. } => EntityKind::Organization,
            CycleSnapshot::User { .. } => EntityKind::User,
            CycleSnapshot::Plain { kind, .. } => *kind,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            CycleSnapshot::Organization { key, .. }
            | CycleSnapshot::User { key, .. }
            | CycleSnapshot::Plain { key, .. } => key,
        }
    }

    pub fn was_new(&self) -> bool {
        match self {
            CycleSnapshot::Organization { was_new, .. }
            | CycleSnapshot::User { was_new, .. }
            | CycleSnapshot::Plain { was_new, .. } => *was_new,
        }
    }
}

/// Capability shared by every record kind in the global registry.
///
/// The serialized form is what the store persists; client bookkeeping
/// (`RecordMeta`, relation statuses) is skipped by serde.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Name of the attribute holding the document key
    const KEY_ATTRIBUTE: &'static str;

    /// Attributes that a change patch may not touch (nested relations
    /// have their own methods)
    const PROTECTED_ATTRIBUTES: &'static [&'static str] = &[];

    fn key(&self) -> &str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Checks required attributes before the primary write.
    fn validate(&self) -> Result<()>;

    fn status(&self) -> EntityStatus {
        self.meta().status()
    }

    fn is_new(&self) -> bool {
        self.meta().is_new()
    }

    fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot::Plain {
            kind: Self::KIND,
            key: self.key().to_string(),
            was_new: self.is_new(),
        }
    }

    /// Moves nested relations to COMMITTED after a successful primary write.
    fn commit_relations(&mut self) {}

    /// Copies client-side state from the record a patch was applied to.
    fn carry_client_state(&mut self, previous: Self);
}

/// Applies `changes` to `record`, returning whether anything was applied.
///
/// The key attribute is read-only once the record has been committed.
pub fn apply_changes<R: Record>(record: &mut R, changes: &Changes) -> Result<bool> {
    if changes.is_empty() {
        return Ok(false);
    }

    for attribute in changes.keys() {
        if R::PROTECTED_ATTRIBUTES.contains(&attribute.as_str()) {
            return Err(RegistryError::ReadOnlyAttribute {
                kind: R::KIND,
                attribute: attribute.clone(),
            });
        }
    }

    if let Some(key) = changes.get(R::KEY_ATTRIBUTE) {
        let unchanged = key.as_str() == Some(record.key());
        if !unchanged && record.meta().is_persisted() {
            return Err(RegistryError::ReadOnlyAttribute {
                kind: R::KIND,
                attribute: R::KEY_ATTRIBUTE.to_string(),
            });
        }
    }

    let mut value = serde_json::to_value(&*record)?;
    let fields = value.as_object_mut().ok_or_else(|| {
        RegistryError::Serialization(format!("{} must serialize to a JSON object", R::KIND))
    })?;
    for (attribute, new_value) in changes {
        if !fields.contains_key(attribute) {
            return Err(RegistryError::Validation {
                kind: R::KIND,
                key: record.key().to_string(),
                message: format!("unknown attribute '{}'", attribute),
            });
        }
        fields.insert(attribute.clone(), new_value.clone());
    }

    let patched: R = serde_json::from_value(value).map_err(|e| RegistryError::Validation {
        kind: R::KIND,
        key: record.key().to_string(),
        message: e.to_string(),
    })?;

    let previous = std::mem::replace(record, patched);
    record.carry_client_state(previous);
    record.meta_mut().touch();
    Ok(true)
}

/// Fails with a validation error unless `present` holds.
pub(crate) fn require(kind: EntityKind, key: &str, attribute: &str, present: bool) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(RegistryError::Validation {
            kind,
            key: key.to_string(),
            message: format!("'{}' is required", attribute),
        })
    }
}
