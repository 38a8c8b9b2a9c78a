use super::record::{CycleSnapshot, Record, require};
use crate::core::{EntityKind, RecordMeta, RelationStatus, Result};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// Relation between a user and an organization. `username` is the name the
/// user is known by inside the organization's instance database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    name: String,
    #[serde(default)]
    username: String,
    #[serde(skip)]
    status: RelationStatus,
}

impl OrganizationMembership {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            name: organization.into(),
            username: String::new(),
            status: RelationStatus::New,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Organization key
    pub fn organization(&self) -> &str {
        &self.name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn status(&self) -> RelationStatus {
        self.status
    }

    pub fn is_new(&self) -> bool {
        self.status == RelationStatus::New
    }

    /// Inherits the owning user's key as access name. Only applies while the
    /// membership is NEW and has no explicit username.
    pub fn user_did_change(&mut self, user_key: &str) {
        if self.is_new() && !user_key.is_empty() && self.username.is_empty() {
            self.username = user_key.to_string();
        }
    }

    fn validate(&self, user_key: &str) -> Result<()> {
        require(EntityKind::User, user_key, "organizations.name", !self.name.is_empty())?;
        require(
            EntityKind::User,
            user_key,
            "organizations.username",
            !self.username.is_empty(),
        )
    }
}

/// User account in the global registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: String,
    email: String,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    proper_name: Option<String>,
    #[serde(default)]
    organizations: Vec<OrganizationMembership>,
    #[serde(default)]
    privileges: Vec<String>,
    #[serde(skip)]
    meta: RecordMeta,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            is_active: true,
            proper_name: None,
            organizations: Vec::new(),
            privileges: Vec::new(),
            meta: RecordMeta::new(),
        }
    }

    pub fn with_proper_name(mut self, name: impl Into<String>) -> Self {
        self.proper_name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn proper_name(&self) -> Option<&str> {
        self.proper_name.as_deref()
    }

    pub fn organizations(&self) -> &[OrganizationMembership] {
        &self.organizations
    }

    pub fn privileges(&self) -> &[String] {
        &self.privileges
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        if self.email != email {
            self.email = email;
            self.meta.touch();
        }
    }

    pub fn set_active(&mut self, active: bool) {
        if self.is_active != active {
            self.is_active = active;
            self.meta.touch();
        }
    }

    /// Links the user to an organization. Returns false if already linked.
    pub fn add_organization(&mut self, membership: OrganizationMembership) -> bool {
        if self
            .organizations
            .iter()
            .any(|m| m.name == membership.name)
        {
            return false;
        }
        let mut membership = membership;
        membership.status = RelationStatus::New;
        membership.user_did_change(&self.id);
        self.organizations.push(membership);
        self.meta.touch();
        true
    }

    pub fn remove_organization(&mut self, organization: &str) -> bool {
        let len_before = self.organizations.len();
        self.organizations.retain(|m| m.name != organization);
        let removed = len_before != self.organizations.len();
        if removed {
            self.meta.touch();
        }
        removed
    }

    /// Grants a global privilege. Returns false if already granted.
    pub fn grant_privilege(&mut self, privilege: impl Into<String>) -> bool {
        let privilege = privilege.into();
        if self.privileges.contains(&privilege) {
            return false;
        }
        self.privileges.push(privilege);
        self.meta.touch();
        true
    }

    pub fn revoke_privilege(&mut self, privilege: &str) -> bool {
        let len_before = self.privileges.len();
        self.privileges.retain(|p| p != privilege);
        let removed = len_before != self.privileges.len();
        if removed {
            self.meta.touch();
        }
        removed
    }

    pub fn has_privilege(&self, privilege: &str) -> bool {
        self.privileges.iter().any(|p| p == privilege)
    }
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;
    const KEY_ATTRIBUTE: &'static str = "id";
    const PROTECTED_ATTRIBUTES: &'static [&'static str] = &["organizations", "privileges"];

    fn key(&self) -> &str {
        &self.id
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require(Self::KIND, &self.id, "id", !self.id.trim().is_empty())?;
        require(Self::KIND, &self.id, "email", !self.email.trim().is_empty())?;
        for membership in &self.organizations {
            membership.validate(&self.id)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot::User {
            key: self.id.clone(),
            was_new: self.is_new(),
            organizations: self.organizations.iter().map(|m| m.name.clone()).collect(),
        }
    }

    fn commit_relations(&mut self) {
        for membership in &mut self.organizations {
            membership.status = RelationStatus::Committed;
        }
    }

    fn carry_client_state(&mut self, previous: Self) {
        self.organizations = previous.organizations;
        self.privileges = previous.privileges;
        self.meta = previous.meta;
        for membership in &mut self.organizations {
            membership.user_did_change(&self.id);
        }
    }
}
