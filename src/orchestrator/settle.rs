use super::cycle::{Cycle, CyclePhase};
use super::followup::FollowUpPlan;
use super::reset::run_reset;
use crate::core::{EntityKind, RegistryError, Result};
use crate::gateway::{MaintenanceGateway, MaintenanceOutcome, OperationKind};
use crate::notify::{NotificationSink, Severity};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

/// Summary of a settled cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub kind: EntityKind,
    pub key: String,
    /// Outcomes of the planned follow-ups, in completion order
    pub outcomes: Vec<MaintenanceOutcome>,
    /// Outcome of the password reset gated on the follow-ups, if it fired
    pub reset: Option<MaintenanceOutcome>,
    pub phases: Vec<CyclePhase>,
}

impl CycleReport {
    fn from_cycle(cycle: &Cycle, outcomes: Vec<MaintenanceOutcome>) -> Self {
        Self {
            cycle_id: cycle.id(),
            kind: cycle.kind(),
            key: cycle.key().to_string(),
            outcomes,
            reset: None,
            phases: cycle.history().to_vec(),
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phases.last().copied().unwrap_or(CyclePhase::Initiated)
    }

    pub fn failures(&self) -> Vec<&MaintenanceOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn reset_triggered(&self) -> bool {
        self.reset.is_some()
    }
}

enum HandleState {
    Settled(CycleReport),
    Running(JoinHandle<CycleReport>),
}

/// Observes the follow-ups of a committed save.
///
/// Dropping the handle does not cancel anything: dispatched follow-ups run
/// to completion and are still logged.
pub struct FollowUpHandle {
    cycle_id: Uuid,
    dispatched: usize,
    state: HandleState,
}

impl FollowUpHandle {
    pub(crate) fn settled(report: CycleReport) -> Self {
        Self {
            cycle_id: report.cycle_id,
            dispatched: 0,
            state: HandleState::Settled(report),
        }
    }

    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    /// Number of gateway requests dispatched when the save returned
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn is_settled(&self) -> bool {
        match &self.state {
            HandleState::Settled(_) => true,
            HandleState::Running(join) => join.is_finished(),
        }
    }

    /// Waits until every follow-up of the cycle has reported an outcome.
    pub async fn settle(self) -> Result<CycleReport> {
        match self.state {
            HandleState::Settled(report) => Ok(report),
            HandleState::Running(join) => join.await.map_err(|e| {
                RegistryError::InvalidState(format!(
                    "follow-ups of cycle {} did not settle: {}",
                    self.cycle_id, e
                ))
            }),
        }
    }
}

impl std::fmt::Debug for FollowUpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUpHandle")
            .field("cycle_id", &self.cycle_id)
            .field("dispatched", &self.dispatched)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Shared collaborators of a dispatch
pub(crate) struct DispatchContext {
    pub gateway: Arc<dyn MaintenanceGateway>,
    pub sink: Arc<dyn NotificationSink>,
    pub notify_users: bool,
}

/// Issues every planned request concurrently and returns immediately.
///
/// Each request runs on its own task and reports into a channel; a single
/// aggregator counts outcomes down to zero, so the join needs no lock. Once
/// all outcomes are in, the gated password reset fires exactly once.
pub(crate) fn dispatch(
    mut cycle: Cycle,
    plan: FollowUpPlan,
    ctx: DispatchContext,
) -> Result<FollowUpHandle> {
    cycle.advance(CyclePhase::FollowUpsDispatched)?;

    let span = info_span!(
        "follow_ups",
        cycle_id = %cycle.id(),
        kind = %cycle.kind(),
        key = %cycle.key()
    );
    let FollowUpPlan {
        requests,
        reset_after_settle,
    } = plan;
    let dispatched = requests.len();
    let (tx, mut rx) = mpsc::channel::<MaintenanceOutcome>(dispatched.max(1));

    for request in requests {
        let gateway = ctx.gateway.clone();
        let tx = tx.clone();
        tokio::spawn(
            async move {
                let result = gateway.execute(&request).await;
                let outcome = MaintenanceOutcome::from_result(request, result);
                // the aggregator outlives every sender, a failed send means it panicked
                let _ = tx.send(outcome).await;
            }
            .instrument(span.clone()),
        );
    }
    drop(tx);

    let cycle_id = cycle.id();
    let aggregator = async move {
        let mut remaining = dispatched;
        let mut outcomes = Vec::with_capacity(dispatched);
        let mut reset = None;

        if let Err(err) = cycle.advance(CyclePhase::FollowUpsSettling) {
            event!(Level::ERROR, error = %err, "cycle bookkeeping failed");
        }

        while remaining > 0 {
            let Some(outcome) = rx.recv().await else {
                event!(Level::ERROR, remaining, "follow-up tasks vanished before settling");
                break;
            };
            route_outcome(ctx.sink.as_ref(), &outcome);
            outcomes.push(outcome);
            remaining -= 1;
        }

        // settlement counts completion, not success
        if remaining == 0 {
            if let Some(user) = &reset_after_settle {
                event!(Level::DEBUG, user = %user, "all memberships synchronized, resetting password");
                reset = Some(
                    run_reset(
                        ctx.gateway.as_ref(),
                        ctx.sink.as_ref(),
                        user,
                        true,
                        ctx.notify_users,
                    )
                    .await,
                );
            }
        }

        if let Err(err) = cycle.advance(CyclePhase::Complete) {
            event!(Level::ERROR, error = %err, "cycle bookkeeping failed");
        }
        event!(
            Level::DEBUG,
            settled = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "cycle complete"
        );

        let mut report = CycleReport::from_cycle(&cycle, outcomes);
        report.reset = reset;
        report
    }
    .instrument(span);

    Ok(FollowUpHandle {
        cycle_id,
        dispatched,
        state: HandleState::Running(tokio::spawn(aggregator)),
    })
}

/// Follow-up outcomes end here: they are logged and never escalated.
pub(crate) fn route_outcome(sink: &dyn NotificationSink, outcome: &MaintenanceOutcome) {
    let key = outcome.request.target.as_str();
    match outcome.request.operation {
        OperationKind::Provision | OperationKind::InstallExtensions => {
            if outcome.success {
                sink.log(Severity::Info, "Database maintenance successful", Some(key));
            } else if outcome.is_system_error() {
                event!(Level::WARN, key, detail = ?outcome.error_detail, "maintenance call failed");
                sink.log(
                    Severity::Error,
                    "Database maintenance system error",
                    outcome.error_detail.as_deref(),
                );
            } else {
                event!(Level::WARN, key, detail = ?outcome.error_detail, "maintenance reported error");
                sink.log(
                    Severity::Warning,
                    "Database maintenance error",
                    outcome.error_detail.as_deref(),
                );
            }
        }
        OperationKind::SyncUser => {
            let organization = outcome.request.payload.organization.as_deref();
            if outcome.success {
                sink.log(Severity::Info, "Instance database user synchronized", organization);
            } else {
                event!(Level::WARN, key, ?organization, detail = ?outcome.error_detail, "user sync failed");
                sink.log(
                    Severity::Warning,
                    "Error updating instance database",
                    outcome.error_detail.as_deref(),
                );
            }
        }
        OperationKind::ResetPassword => {
            if outcome.success {
                sink.log(Severity::Info, "Password reset completed", Some(key));
            } else {
                event!(Level::WARN, key, detail = ?outcome.error_detail, "password reset failed");
                sink.log(
                    Severity::Warning,
                    "Password reset error",
                    outcome.error_detail.as_deref(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MaintenanceRequest, MaintenanceResponse};
    use crate::notify::MemorySink;

    #[test]
    fn test_route_maintenance_outcomes() {
        let sink = MemorySink::new();
        let request = MaintenanceRequest::provision("Acme", &[]);

        route_outcome(
            &sink,
            &MaintenanceOutcome::from_result(request.clone(), Ok(MaintenanceResponse::ok())),
        );
        route_outcome(
            &sink,
            &MaintenanceOutcome::from_result(request.clone(), Ok(MaintenanceResponse::error("x"))),
        );
        route_outcome(
            &sink,
            &MaintenanceOutcome::from_result(request, Err(GatewayError::Timeout)),
        );

        assert_eq!(
            sink.log_messages(),
            vec![
                "Database maintenance successful",
                "Database maintenance error",
                "Database maintenance system error",
            ]
        );
        assert!(sink.user_notices().is_empty());
    }

    #[test]
    fn test_route_sync_failure() {
        let sink = MemorySink::new();
        let request = MaintenanceRequest::sync_user("u1", "orgX");
        route_outcome(
            &sink,
            &MaintenanceOutcome::from_result(request, Err(GatewayError::Transport("down".into()))),
        );
        assert_eq!(sink.log_messages(), vec!["Error updating instance database"]);
    }
}
