//! Remote maintenance gateway
//!
//! The gateway reaches the administration service that provisions instance
//! databases, installs extensions, grants users access to organizations and
//! resets passwords. Each call completes independently with a response or a
//! [`GatewayError`].

pub mod http;
pub mod recording;
pub mod request;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpGateway;
pub use recording::{RecordingGateway, ScriptedReply};
pub use request::{
    MaintenanceOutcome, MaintenanceParams, MaintenanceRequest, MaintenanceResponse, OperationKind,
};

/// Failure to complete a maintenance call. Never escapes the follow-up
/// boundary: it is folded into a [`MaintenanceOutcome`] and logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("Maintenance endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Invalid maintenance response: {0}")]
    Decode(String),

    /// The call did not finish in time.
    #[error("Maintenance call timed out")]
    Timeout,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Remote maintenance operations. Implementations must be safe to call
/// concurrently; the orchestrator issues follow-ups of one cycle in parallel.
#[async_trait]
pub trait MaintenanceGateway: Send + Sync {
    async fn execute(
        &self,
        request: &MaintenanceRequest,
    ) -> std::result::Result<MaintenanceResponse, GatewayError>;
}
