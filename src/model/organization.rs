use super::record::{CycleSnapshot, Record, require};
use crate::core::{EntityKind, RecordMeta, RelationStatus, Result};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// Relation between an organization and an installed extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionAttachment {
    extension: String,
    #[serde(skip)]
    status: RelationStatus,
}

impl ExtensionAttachment {
    /// A freshly attached extension, not yet committed
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            status: RelationStatus::New,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn status(&self) -> RelationStatus {
        self.status
    }

    pub fn is_new(&self) -> bool {
        self.status == RelationStatus::New
    }
}

/// Tenant record in the global registry. Each organization owns an
/// instance database provisioned through the maintenance gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    name: String,
    #[serde(default = "default_active")]
    is_active: bool,
    licenses: u32,
    group: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    database_server: Option<String>,
    #[serde(default)]
    extensions: Vec<ExtensionAttachment>,
    #[serde(skip)]
    meta: RecordMeta,
}

impl Organization {
    pub fn new(name: impl Into<String>, group: impl Into<String>, licenses: u32) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            licenses,
            group: group.into(),
            description: None,
            database_server: None,
            extensions: Vec::new(),
            meta: RecordMeta::new(),
        }
    }

    pub fn with_database_server(mut self, server: impl Into<String>) -> Self {
        self.database_server = Some(server.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn licenses(&self) -> u32 {
        self.licenses
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn database_server(&self) -> Option<&str> {
        self.database_server.as_deref()
    }

    pub fn extensions(&self) -> &[ExtensionAttachment] {
        &self.extensions
    }

    pub fn set_active(&mut self, active: bool) {
        if self.is_active != active {
            self.is_active = active;
            self.meta.touch();
        }
    }

    pub fn set_licenses(&mut self, licenses: u32) {
        if self.licenses != licenses {
            self.licenses = licenses;
            self.meta.touch();
        }
    }

    /// Attaches an extension. Returns false if it is already attached.
    pub fn attach_extension(&mut self, extension: impl Into<String>) -> bool {
        let extension = extension.into();
        if self.extensions.iter().any(|a| a.extension == extension) {
            return false;
        }
        self.extensions.push(ExtensionAttachment::new(extension));
        self.meta.touch();
        true
    }

    /// Detaches an extension. Returns false if it was not attached.
    pub fn detach_extension(&mut self, extension: &str) -> bool {
        let len_before = self.extensions.len();
        self.extensions.retain(|a| a.extension != extension);
        let removed = len_before != self.extensions.len();
        if removed {
            self.meta.touch();
        }
        removed
    }

    /// Extension ids whose attachment has not been committed yet
    pub fn pending_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .filter(|a| a.is_new())
            .map(|a| a.extension.clone())
            .collect()
    }
}

impl Record for Organization {
    const KIND: EntityKind = EntityKind::Organization;
    const KEY_ATTRIBUTE: &'static str = "name";
    const PROTECTED_ATTRIBUTES: &'static [&'static str] = &["extensions"];

    fn key(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require(Self::KIND, &self.name, "name", !self.name.trim().is_empty())?;
        require(Self::KIND, &self.name, "licenses", self.licenses > 0)?;
        require(Self::KIND, &self.name, "group", !self.group.trim().is_empty())?;
        Ok(())
    }

    fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot::Organization {
            key: self.name.clone(),
            was_new: self.is_new(),
            pending_extensions: self.pending_extensions(),
        }
    }

    fn commit_relations(&mut self) {
        for attachment in &mut self.extensions {
            attachment.status = RelationStatus::Committed;
        }
    }

    fn carry_client_state(&mut self, previous: Self) {
        self.extensions = previous.extensions;
        self.meta = previous.meta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityStatus, RegistryError};
    use crate::model::record::apply_changes;
    use chrono::Utc;
    use serde_json::json;

    fn committed_org() -> Organization {
        let mut org = Organization::new("acme", "east", 5);
        org.attach_extension("ext.a");
        org.commit_relations();
        org.meta_mut().committed(1, Utc::now());
        org
    }

    #[test]
    fn test_new_organization_defaults() {
        let org = Organization::new("acme", "east", 5);
        assert!(org.is_active());
        assert!(org.is_new());
        assert!(org.validate().is_ok());
    }

    #[test]
    fn test_required_attributes() {
        let org = Organization::new("acme", "", 5);
        let err = org.validate().unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));
        assert!(err.to_string().contains("group"));

        let org = Organization::new("acme", "east", 0);
        assert!(org.validate().unwrap_err().to_string().contains("licenses"));
    }

    #[test]
    fn test_pending_extensions_only_new_attachments() {
        let mut org = committed_org();
        assert!(org.pending_extensions().is_empty());

        assert!(org.attach_extension("ext.b"));
        assert!(!org.attach_extension("ext.b"));
        assert_eq!(org.pending_extensions(), vec!["ext.b".to_string()]);
        assert_eq!(org.status(), EntityStatus::Dirty);
    }

    #[test]
    fn test_snapshot_captures_pending_extensions() {
        let mut org = Organization::new("acme", "east", 5);
        org.attach_extension("ext.a");
        org.attach_extension("ext.b");

        let snapshot = org.snapshot();
        org.commit_relations();

        assert_eq!(
            snapshot,
            CycleSnapshot::Organization {
                key: "acme".into(),
                was_new: true,
                pending_extensions: vec!["ext.a".into(), "ext.b".into()],
            }
        );
        assert!(org.pending_extensions().is_empty());
    }

    #[test]
    fn test_apply_changes_marks_dirty_and_keeps_relations() {
        let mut org = committed_org();
        org.attach_extension("ext.b");

        let changes = json!({ "licenses": 12 }).as_object().cloned().unwrap();
        assert!(apply_changes(&mut org, &changes).unwrap());

        assert_eq!(org.licenses(), 12);
        assert_eq!(org.status(), EntityStatus::Dirty);
        assert_eq!(org.pending_extensions(), vec!["ext.b".to_string()]);
        assert_eq!(org.extensions().len(), 2);
    }

    #[test]
    fn test_key_read_only_once_committed() {
        let mut org = committed_org();
        let changes = json!({ "name": "other" }).as_object().cloned().unwrap();
        let err = apply_changes(&mut org, &changes).unwrap_err();
        assert!(matches!(err, RegistryError::ReadOnlyAttribute { .. }));

        let mut fresh = Organization::new("acme", "east", 5);
        assert!(apply_changes(&mut fresh, &changes).unwrap());
        assert_eq!(fresh.name(), "other");
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut org = committed_org();
        let changes = json!({ "licences": 12 }).as_object().cloned().unwrap();
        let err = apply_changes(&mut org, &changes).unwrap_err();

        assert!(matches!(err, RegistryError::Validation { .. }));
        assert!(err.to_string().contains("licences"));
        assert_eq!(org.licenses(), 5);
        assert_eq!(org.status(), EntityStatus::Ready);
    }

    #[test]
    fn test_extensions_not_patchable() {
        let mut org = Organization::new("acme", "east", 5);
        let changes = json!({ "extensions": [] }).as_object().cloned().unwrap();
        assert!(apply_changes(&mut org, &changes).is_err());
    }

    #[test]
    fn test_loaded_relations_are_committed() {
        let org: Organization = serde_json::from_value(json!({
            "name": "acme",
            "licenses": 3,
            "group": "east",
            "extensions": [{ "extension": "ext.a" }]
        }))
        .unwrap();
        assert!(org.is_active());
        assert_eq!(org.extensions()[0].status(), RelationStatus::Committed);
    }
}
