//! Catalog records of the global registry. Saving them implies no
//! maintenance follow-ups.

use super::record::{Record, require};
use crate::core::{EntityKind, RecordMeta, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An installable extension, referenced by organization attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(skip)]
    meta: RecordMeta,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            location: None,
            meta: RecordMeta::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl Record for Extension {
    const KIND: EntityKind = EntityKind::Extension;
    const KEY_ATTRIBUTE: &'static str = "name";

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
        require(Self::KIND, &self.name, "name", !self.name.trim().is_empty())
    }

    fn carry_client_state(&mut self, previous: Self) {
        self.meta = previous.meta;
    }
}

/// Database server hosting organization instance databases
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseServer {
    name: String,
    hostname: String,
    port: u16,
    user: String,
    password: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(skip)]
    meta: RecordMeta,
}

impl DatabaseServer {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            port,
            user: user.into(),
            password: password.into(),
            description: None,
            meta: RecordMeta::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Debug for DatabaseServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseServer")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("description", &self.description)
            .field("meta", &self.meta)
            .finish()
    }
}

impl Record for DatabaseServer {
    const KIND: EntityKind = EntityKind::DatabaseServer;
    const KEY_ATTRIBUTE: &'static str = "name";

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
        require(Self::KIND, &self.name, "hostname", !self.hostname.trim().is_empty())?;
        require(Self::KIND, &self.name, "port", self.port > 0)?;
        require(Self::KIND, &self.name, "user", !self.user.is_empty())?;
        require(Self::KIND, &self.name, "password", !self.password().is_empty())?;
        Ok(())
    }

    fn carry_client_state(&mut self, previous: Self) {
        self.meta = previous.meta;
    }
}

/// A privilege that can be granted to users across all organizations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPrivilege {
    name: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(skip)]
    meta: RecordMeta,
}

impl GlobalPrivilege {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            description: None,
            meta: RecordMeta::new(),
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Record for GlobalPrivilege {
    const KIND: EntityKind = EntityKind::GlobalPrivilege;
    const KEY_ATTRIBUTE: &'static str = "name";

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
        require(Self::KIND, &self.name, "name", !self.name.trim().is_empty())
    }

    fn carry_client_state(&mut self, previous: Self) {
        self.meta = previous.meta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::CycleSnapshot;

    #[test]
    fn test_database_server_required_attributes() {
        let server = DatabaseServer::new("db1", "db1.internal", 5432, "admin", "");
        assert!(server.validate().unwrap_err().to_string().contains("password"));

        let server = DatabaseServer::new("db1", "db1.internal", 0, "admin", "secret");
        assert!(server.validate().unwrap_err().to_string().contains("port"));

        let server = DatabaseServer::new("db1", "db1.internal", 5432, "admin", "secret");
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_database_server_debug_hides_password() {
        let server = DatabaseServer::new("db1", "db1.internal", 5432, "admin", "secret");
        let rendered = format!("{:?}", server);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_catalog_snapshot_is_plain() {
        let ext = Extension::new("ext.a");
        assert_eq!(
            ext.snapshot(),
            CycleSnapshot::Plain {
                kind: EntityKind::Extension,
                key: "ext.a".into(),
                was_new: true,
            }
        );
    }
}
