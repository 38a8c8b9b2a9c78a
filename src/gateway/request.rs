use serde::{Deserialize, Serialize};
use std::fmt;

use super::GatewayError;

/// Remote maintenance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Create the organization's instance database (may also install
    /// extensions when combined)
    Provision,
    InstallExtensions,
    SyncUser,
    ResetPassword,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Provision => "provision",
            OperationKind::InstallExtensions => "install-extensions",
            OperationKind::SyncUser => "sync-user",
            OperationKind::ResetPassword => "reset-password",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Parameter bag of a maintenance request.
///
/// Boolean flags are present-means-true: a false flag is never put on the
/// wire, because the maintenance route reads any present value (even the
/// string "false") as set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// JSON-encoded array of extension ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub initialize: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub new_user: bool,
}

impl MaintenanceParams {
    /// Wire parameters, omitting absent values and false flags
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(organization) = &self.organization {
            pairs.push(("organization", organization.clone()));
        }
        if let Some(user) = &self.user {
            pairs.push(("user", user.clone()));
        }
        if let Some(extensions) = &self.extensions {
            pairs.push(("extensions", extensions.clone()));
        }
        if self.initialize {
            pairs.push(("initialize", "true".to_string()));
        }
        if self.new_user {
            pairs.push(("newUser", "true".to_string()));
        }
        pairs
    }

    /// Decoded extension ids, empty when none were sent
    pub fn extension_ids(&self) -> Vec<String> {
        self.extensions
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// Encodes extension ids the way the maintenance route expects them
pub fn encode_extensions(ids: &[String]) -> String {
    serde_json::Value::from(ids.to_vec()).to_string()
}

/// One remote operation, alive for the duration of a single dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceRequest {
    pub operation: OperationKind,
    /// Key of the record the operation is about
    pub target: String,
    pub payload: MaintenanceParams,
}

impl MaintenanceRequest {
    /// Provision a new organization's instance database and install
    /// `extensions` into it.
    pub fn provision(organization: &str, extensions: &[String]) -> Self {
        Self {
            operation: OperationKind::Provision,
            target: organization.to_string(),
            payload: MaintenanceParams {
                organization: Some(organization.to_string()),
                extensions: Some(encode_extensions(extensions)),
                initialize: true,
                ..Default::default()
            },
        }
    }

    pub fn install_extensions(organization: &str, extensions: &[String]) -> Self {
        Self {
            operation: OperationKind::InstallExtensions,
            target: organization.to_string(),
            payload: MaintenanceParams {
                organization: Some(organization.to_string()),
                extensions: Some(encode_extensions(extensions)),
                ..Default::default()
            },
        }
    }

    pub fn sync_user(user: &str, organization: &str) -> Self {
        Self {
            operation: OperationKind::SyncUser,
            target: user.to_string(),
            payload: MaintenanceParams {
                organization: Some(organization.to_string()),
                user: Some(user.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn reset_password(user: &str, new_user: bool) -> Self {
        Self {
            operation: OperationKind::ResetPassword,
            target: user.to_string(),
            payload: MaintenanceParams {
                user: Some(user.to_string()),
                new_user,
                ..Default::default()
            },
        }
    }
}

/// Response body of the maintenance endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceResponse {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_success: Option<bool>,
}

impl MaintenanceResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            is_error: true,
            detail: Some(detail.into()),
            email_success: None,
        }
    }

    pub fn with_email_success(mut self, success: bool) -> Self {
        self.email_success = Some(success);
        self
    }
}

/// Result of one dispatched request, consumed once by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceOutcome {
    pub request: MaintenanceRequest,
    pub success: bool,
    pub error_detail: Option<String>,
    pub response: Option<MaintenanceResponse>,
}

impl MaintenanceOutcome {
    pub fn from_result(
        request: MaintenanceRequest,
        result: std::result::Result<MaintenanceResponse, GatewayError>,
    ) -> Self {
        match result {
            Ok(response) if response.is_error => Self {
                request,
                success: false,
                error_detail: Some(
                    response
                        .detail
                        .clone()
                        .unwrap_or_else(|| "maintenance route reported an error".to_string()),
                ),
                response: Some(response),
            },
            Ok(response) => Self {
                request,
                success: true,
                error_detail: None,
                response: Some(response),
            },
            Err(err) => Self {
                request,
                success: false,
                error_detail: Some(err.to_string()),
                response: None,
            },
        }
    }

    /// Whether the gateway itself could not be reached or answered garbage,
    /// as opposed to the operation reporting an error
    pub fn is_system_error(&self) -> bool {
        !self.success && self.response.is_none()
    }
}
