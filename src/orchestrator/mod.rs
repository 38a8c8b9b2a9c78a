//! Post-write reconciliation
//!
//! A save writes the record of truth first. Only once that write has
//! committed does the orchestrator work out which remote maintenance
//! operations the change implies (instance database provisioning,
//! extension installation, user synchronization), dispatch them
//! concurrently and hand the caller a [`FollowUpHandle`] to observe them.
//! Follow-up failures are logged; they never undo the primary write and are
//! never reported as a save error.
//!
//! ```text
//!  save(record)
//!     │ snapshot (status, NEW relations)
//!     ▼
//!  EntityStore ──error──► Err(primary write error), no follow-ups
//!     │ committed
//!     ▼
//!  plan_follow_ups ──empty──► receipt (settled)
//!     │
//!     ▼
//!  Gateway × N (parallel) ──► aggregator ──► NotificationSink
//!                                 │ all N settled, user was new
//!                                 ▼
//!                          password reset
//! ```

pub mod cycle;
pub mod followup;
pub mod reset;
pub mod settle;

use crate::config::OrchestratorConfig;
use crate::core::{EntityKind, EntityStatus, RegistryError, Result};
use crate::gateway::MaintenanceGateway;
use crate::model::{Changes, Record, User, apply_changes};
use crate::notify::{NotificationSink, Severity};
use crate::storage::{EntityStore, StoredRecord, load_record, write_record};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

pub use cycle::{Cycle, CyclePhase};
pub use followup::{FollowUpPlan, plan_follow_ups};
pub use reset::ResetHandle;
pub use settle::{CycleReport, FollowUpHandle};

/// Result of a save whose primary write committed
#[derive(Debug)]
pub struct SaveReceipt {
    /// The committed record as the store now holds it
    pub stored: StoredRecord,
    /// Follow-ups dispatched by this cycle
    pub follow_ups: FollowUpHandle,
}

impl SaveReceipt {
    pub fn version(&self) -> i64 {
        self.stored.version
    }

    /// Waits for every follow-up of the cycle to report an outcome
    pub async fn settle(self) -> Result<CycleReport> {
        self.follow_ups.settle().await
    }
}

/// Reconciliation orchestrator: wraps primary writes and drives the remote
/// maintenance operations they imply.
pub struct Orchestrator {
    store: Arc<dyn EntityStore>,
    gateway: Arc<dyn MaintenanceGateway>,
    sink: Arc<dyn NotificationSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        gateway: Arc<dyn MaintenanceGateway>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::with_config(store, gateway, sink, OrchestratorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn EntityStore>,
        gateway: Arc<dyn MaintenanceGateway>,
        sink: Arc<dyn NotificationSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Saves a record and dispatches the follow-ups the change implies.
    ///
    /// Returns as soon as the primary write has committed and the
    /// follow-ups are in flight. A primary write error is returned as is
    /// and no follow-up is attempted.
    pub async fn save<R: Record>(&self, record: &mut R) -> Result<SaveReceipt> {
        self.save_with(record, &Changes::new()).await
    }

    /// Applies `changes` to the record, then saves it like [`save`].
    ///
    /// [`save`]: Orchestrator::save
    pub async fn save_with<R: Record>(&self, record: &mut R, changes: &Changes) -> Result<SaveReceipt> {
        apply_changes(record, changes)?;

        let status = record.status();
        if !status.is_saveable() {
            return Err(RegistryError::InvalidState(format!(
                "cannot save {} '{}' from status {:?}",
                R::KIND,
                record.key(),
                status
            )));
        }

        // must precede the write: committing clears NEW relation statuses
        let snapshot = record.snapshot();
        let mut cycle = Cycle::new(&snapshot);
        let span = info_span!(
            "save_cycle",
            cycle_id = %cycle.id(),
            kind = %R::KIND,
            key = %record.key()
        );

        async move {
            cycle.advance(CyclePhase::PrimaryPending)?;

            let written = match record.validate() {
                Ok(()) => write_record(self.store.as_ref(), record).await,
                Err(err) => Err(err),
            };

            let stored = match written {
                Ok(stored) => stored,
                Err(err) => {
                    record.meta_mut().failed();
                    cycle.advance(CyclePhase::PrimaryFailed)?;
                    event!(Level::ERROR, error = %err, "primary write failed");
                    return Err(err);
                }
            };

            record.meta_mut().committed(stored.version, stored.updated_at);
            record.commit_relations();
            cycle.advance(CyclePhase::PrimaryCommitted)?;
            event!(
                Level::DEBUG,
                version = stored.version,
                was_new = snapshot.was_new(),
                "primary write committed"
            );

            let plan = plan_follow_ups(&snapshot, &self.config);
            let follow_ups = if plan.is_empty() {
                cycle.advance(CyclePhase::Complete)?;
                FollowUpHandle::settled(CycleReport {
                    cycle_id: cycle.id(),
                    kind: cycle.kind(),
                    key: cycle.key().to_string(),
                    outcomes: Vec::new(),
                    reset: None,
                    phases: cycle.history().to_vec(),
                })
            } else {
                event!(Level::INFO, requests = plan.len(), "dispatching follow-ups");
                settle::dispatch(
                    cycle,
                    plan,
                    settle::DispatchContext {
                        gateway: self.gateway.clone(),
                        sink: self.sink.clone(),
                        notify_users: self.config.notify_users,
                    },
                )?
            };

            Ok::<_, RegistryError>(SaveReceipt { stored, follow_ups })
        }
        .instrument(span)
        .await
    }

    /// Resets a user's password and e-mails the new one.
    ///
    /// Refused with `StaleWrite` while the user has unsaved changes; nothing
    /// is dispatched in that case.
    pub fn reset_password(&self, user: &User, new_user: bool) -> Result<ResetHandle> {
        if user.status() == EntityStatus::Dirty {
            let err = RegistryError::StaleWrite {
                kind: EntityKind::User,
                key: user.id().to_string(),
            };
            self.sink.log(
                Severity::Error,
                "Password reset refused",
                Some(err.to_string().as_str()),
            );
            return Err(err);
        }

        Ok(ResetHandle::spawn(
            self.gateway.clone(),
            self.sink.clone(),
            user.id().to_string(),
            new_user,
            self.config.notify_users,
        ))
    }

    pub async fn load<R: Record>(&self, key: &str) -> Result<Option<R>> {
        load_record(self.store.as_ref(), key).await
    }

    /// Whether a record of `kind` already uses `key`
    pub async fn find_existing(&self, kind: EntityKind, key: &str) -> Result<bool> {
        self.store.find_existing(kind, key).await
    }
}
