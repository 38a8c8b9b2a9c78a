use super::{GatewayError, MaintenanceGateway, MaintenanceRequest, MaintenanceResponse, OperationKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

/// Scripted reply for one operation kind
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(MaintenanceResponse),
    Fail(GatewayError),
}

/// In-process gateway that records every request and answers from a script.
///
/// Useful for tests and dry runs: by default every call succeeds with an
/// empty response. A paused gateway holds every call until [`release`] is
/// called, which makes the ordering between a save returning and its
/// follow-ups completing observable.
///
/// [`release`]: RecordingGateway::release
pub struct RecordingGateway {
    calls: Mutex<Vec<MaintenanceRequest>>,
    replies: Mutex<HashMap<OperationKind, ScriptedReply>>,
    /// Replies keyed by (operation, target) take precedence
    targeted: Mutex<HashMap<(OperationKind, String), ScriptedReply>>,
    delays: Mutex<HashMap<OperationKind, Duration>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            targeted: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            gate: None,
        }
    }

    /// A gateway whose calls block until released
    pub fn paused() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    /// Lets `count` held calls proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub async fn reply(&self, operation: OperationKind, reply: ScriptedReply) {
        self.replies.lock().await.insert(operation, reply);
    }

    pub async fn reply_for(&self, operation: OperationKind, target: &str, reply: ScriptedReply) {
        self.targeted
            .lock()
            .await
            .insert((operation, target.to_string()), reply);
    }

    /// Replies to requests whose organization parameter is `organization`
    pub async fn reply_for_organization(
        &self,
        operation: OperationKind,
        organization: &str,
        reply: ScriptedReply,
    ) {
        self.reply_for(operation, &format!("org:{}", organization), reply)
            .await;
    }

    pub async fn delay(&self, operation: OperationKind, delay: Duration) {
        self.delays.lock().await.insert(operation, delay);
    }

    /// Every request received so far, in arrival order
    pub async fn calls(&self) -> Vec<MaintenanceRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_for(&self, operation: OperationKind) -> Vec<MaintenanceRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|r| r.operation == operation)
            .cloned()
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn scripted(&self, request: &MaintenanceRequest) -> Option<ScriptedReply> {
        let targeted = self.targeted.lock().await;
        if let Some(reply) = targeted.get(&(request.operation, request.target.clone())) {
            return Some(reply.clone());
        }
        if let Some(organization) = &request.payload.organization {
            let key = (request.operation, format!("org:{}", organization));
            if let Some(reply) = targeted.get(&key) {
                return Some(reply.clone());
            }
        }
        drop(targeted);
        self.replies.lock().await.get(&request.operation).cloned()
    }
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MaintenanceGateway for RecordingGateway {
    async fn execute(
        &self,
        request: &MaintenanceRequest,
    ) -> std::result::Result<MaintenanceResponse, GatewayError> {
        self.calls.lock().await.push(request.clone());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| GatewayError::Transport("gateway shut down".into()))?;
            permit.forget();
        }

        let delay = self.delays.lock().await.get(&request.operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.scripted(request).await {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(err)) => Err(err),
            None => Ok(MaintenanceResponse::ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_defaults_to_success() {
        let gateway = RecordingGateway::new();
        let request = MaintenanceRequest::sync_user("u1", "orgX");
        let response = gateway.execute(&request).await.unwrap();
        assert!(!response.is_error);
        assert_eq!(gateway.calls().await, vec![request]);
    }

    #[tokio::test]
    async fn test_targeted_reply_wins() {
        let gateway = RecordingGateway::new();
        gateway
            .reply(OperationKind::SyncUser, ScriptedReply::Respond(MaintenanceResponse::ok()))
            .await;
        gateway
            .reply_for_organization(
                OperationKind::SyncUser,
                "orgY",
                ScriptedReply::Fail(GatewayError::Timeout),
            )
            .await;

        let x = gateway
            .execute(&MaintenanceRequest::sync_user("u1", "orgX"))
            .await;
        let y = gateway
            .execute(&MaintenanceRequest::sync_user("u1", "orgY"))
            .await;
        assert!(x.is_ok());
        assert_eq!(y.unwrap_err(), GatewayError::Timeout);
        assert_eq!(gateway.calls_for(OperationKind::SyncUser).await.len(), 2);
    }

    #[tokio::test]
    async fn test_paused_gateway_holds_calls() {
        let gateway = Arc::new(RecordingGateway::paused());
        let inner = gateway.clone();
        let call = tokio::spawn(async move {
            inner
                .execute(&MaintenanceRequest::reset_password("u1", true))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!call.is_finished());
        assert_eq!(gateway.call_count().await, 1);

        gateway.release(1);
        assert!(call.await.unwrap().is_ok());
    }
}
