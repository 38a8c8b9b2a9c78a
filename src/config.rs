use crate::core::{RegistryError, Result};
use std::time::Duration;

/// Maintenance gateway endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL of the administration service, without trailing slash
    pub base_url: String,

    /// Route shared by database provisioning and extension installation
    pub maintenance_path: String,

    /// Route granting a user access to an organization's instance database
    pub sync_user_path: String,

    /// Route resetting a password and e-mailing the user
    pub reset_password_path: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Database the gateway resolves records against
    pub database_type: String,

    /// Bearer token sent with every request
    pub api_token: Option<String>,
}

impl GatewayConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            maintenance_path: "/maintenance".to_string(),
            sync_user_path: "/sync-user".to_string(),
            reset_password_path: "/reset-password".to_string(),
            timeout: Duration::from_secs(30),
            database_type: "global".to_string(),
            api_token: None,
        }
    }

    pub fn maintenance_path(mut self, path: &str) -> Self {
        self.maintenance_path = path.to_string();
        self
    }

    pub fn sync_user_path(mut self, path: &str) -> Self {
        self.sync_user_path = path.to_string();
        self
    }

    pub fn reset_password_path(mut self, path: &str) -> Self {
        self.reset_password_path = path.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn database_type(mut self, database_type: &str) -> Self {
        self.database_type = database_type.to_string();
        self
    }

    pub fn api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    /// Parse from an endpoint URL
    ///
    /// Format: `http(s)://host[:port][/base]`
    ///
    /// # Examples
    ///
    /// ```
    /// # use registrysync::GatewayConfig;
    /// let config = GatewayConfig::from_url("https://admin.example.com:8443/api").unwrap();
    /// assert_eq!(config.base_url, "https://admin.example.com:8443/api");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| RegistryError::Config(format!("Invalid gateway URL '{}': {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::Config(format!(
                "Gateway URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(RegistryError::Config("Gateway URL has no host".to_string()));
        }

        Ok(Self::new(parsed.as_str()))
    }

    /// Full URL of a route
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(RegistryError::Config("base_url cannot be empty".to_string()));
        }

        for path in [
            &self.maintenance_path,
            &self.sync_user_path,
            &self.reset_password_path,
        ] {
            if !path.starts_with('/') {
                return Err(RegistryError::Config(format!(
                    "Route '{}' must start with '/'",
                    path
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(RegistryError::Config("timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

/// Behaviour switches of the reconciliation orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Send provisioning and extension installation as one request when an
    /// organization save needs both
    pub combine_maintenance: bool,

    /// Trigger the password reset / welcome e-mail once a new user has been
    /// synchronized to all of their organizations
    pub reset_password_for_new_users: bool,

    /// Raise user-facing notices (e.g. "e-mail sent")
    pub notify_users: bool,
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self {
            combine_maintenance: true,
            reset_password_for_new_users: true,
            notify_users: true,
        }
    }

    pub fn combine_maintenance(mut self, combine: bool) -> Self {
        self.combine_maintenance = combine;
        self
    }

    pub fn reset_password_for_new_users(mut self, enabled: bool) -> Self {
        self.reset_password_for_new_users = enabled;
        self
    }

    pub fn notify_users(mut self, enabled: bool) -> Self {
        self.notify_users = enabled;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete configuration of a [`crate::Registry`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    pub gateway: GatewayConfig,
    pub orchestrator: OrchestratorConfig,
}

impl RegistryConfig {
    pub fn new(gateway: GatewayConfig) -> Self {
        Self {
            gateway,
            orchestrator: OrchestratorConfig::default(),
        }
    }

    pub fn orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.gateway.validate()
    }
}
