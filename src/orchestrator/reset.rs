use super::settle::route_outcome;
use crate::core::{RegistryError, Result};
use crate::gateway::{MaintenanceGateway, MaintenanceOutcome, MaintenanceRequest};
use crate::notify::NotificationSink;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) fn email_sent_message(user: &str) -> String {
    format!("An e-mail with the new password has been sent to {}", user)
}

/// Calls the reset route and routes the outcome. A user-facing notice is
/// raised only when the response confirms the e-mail went out; a reset
/// whose e-mail failed is still a successful call.
pub(crate) async fn run_reset(
    gateway: &dyn MaintenanceGateway,
    sink: &dyn NotificationSink,
    user: &str,
    new_user: bool,
    notify_users: bool,
) -> MaintenanceOutcome {
    let request = MaintenanceRequest::reset_password(user, new_user);
    let result = gateway.execute(&request).await;
    let outcome = MaintenanceOutcome::from_result(request, result);

    route_outcome(sink, &outcome);

    let email_sent = outcome
        .response
        .as_ref()
        .and_then(|r| r.email_success)
        .unwrap_or(false);
    if outcome.success && email_sent && notify_users {
        sink.notify(&email_sent_message(user));
    }

    outcome
}

/// Deferred result of a password reset
#[derive(Debug)]
pub struct ResetHandle {
    join: JoinHandle<MaintenanceOutcome>,
}

impl ResetHandle {
    pub(crate) fn spawn(
        gateway: Arc<dyn MaintenanceGateway>,
        sink: Arc<dyn NotificationSink>,
        user: String,
        new_user: bool,
        notify_users: bool,
    ) -> Self {
        let join = tokio::spawn(async move {
            run_reset(gateway.as_ref(), sink.as_ref(), &user, new_user, notify_users).await
        });
        Self { join }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the gateway's answer
    pub async fn outcome(self) -> Result<MaintenanceOutcome> {
        self.join
            .await
            .map_err(|e| RegistryError::InvalidState(format!("password reset task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MaintenanceResponse, OperationKind, RecordingGateway, ScriptedReply};
    use crate::notify::MemorySink;

    #[tokio::test]
    async fn test_notice_only_when_email_succeeded() {
        let gateway = RecordingGateway::new();
        let sink = MemorySink::new();
        gateway
            .reply(
                OperationKind::ResetPassword,
                ScriptedReply::Respond(MaintenanceResponse::ok().with_email_success(true)),
            )
            .await;

        let outcome = run_reset(&gateway, &sink, "u1", true, true).await;
        assert!(outcome.success);
        assert_eq!(sink.user_notices(), vec![email_sent_message("u1")]);
    }

    #[tokio::test]
    async fn test_email_failure_is_silent_success() {
        let gateway = RecordingGateway::new();
        let sink = MemorySink::new();
        gateway
            .reply(
                OperationKind::ResetPassword,
                ScriptedReply::Respond(MaintenanceResponse::ok().with_email_success(false)),
            )
            .await;

        let outcome = run_reset(&gateway, &sink, "u1", false, true).await;
        assert!(outcome.success);
        assert!(sink.user_notices().is_empty());
        assert_eq!(sink.log_messages(), vec!["Password reset completed"]);
    }

    #[tokio::test]
    async fn test_new_user_flag_is_sent() {
        let gateway = RecordingGateway::new();
        let sink = MemorySink::new();
        run_reset(&gateway, &sink, "u1", true, false).await;

        let calls = gateway.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].payload.new_user);
        assert_eq!(calls[0].payload.user.as_deref(), Some("u1"));
    }
}
