// ============================================================================
// RegistrySync Library
// ============================================================================

pub mod config;
pub mod core;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod storage;

// Re-export main types for convenience
pub use config::{GatewayConfig, OrchestratorConfig, RegistryConfig};
pub use core::{EntityKind, EntityStatus, RecordMeta, RegistryError, RelationStatus, Result};
pub use gateway::{
    GatewayError, HttpGateway, MaintenanceGateway, MaintenanceOutcome, MaintenanceRequest,
    MaintenanceResponse, OperationKind, RecordingGateway,
};
pub use model::{
    Changes, DatabaseServer, Extension, ExtensionAttachment, GlobalPrivilege, Organization,
    OrganizationMembership, Record, User,
};
pub use notify::{MemorySink, NotificationSink, Severity, TracingSink};
pub use orchestrator::{CycleReport, FollowUpHandle, Orchestrator, ResetHandle, SaveReceipt};
pub use storage::{EntityStore, InMemoryEntityStore, StoredRecord};

use futures::future::join_all;
use std::sync::Arc;

// ============================================================================
// High-level Registry API
// ============================================================================

/// Global registry client
///
/// Owns the entity store, the maintenance gateway and the notification
/// sink, and routes every save through the reconciliation orchestrator.
///
/// # Examples
///
/// ```no_run
/// use registrysync::{GatewayConfig, InMemoryEntityStore, Organization, Registry, RegistryConfig};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RegistryConfig::new(GatewayConfig::from_url("http://admin.local/api")?);
/// let registry = Registry::connect(config, Arc::new(InMemoryEntityStore::new()))?;
///
/// let mut acme = Organization::new("Acme", "customers", 10);
/// acme.attach_extension("ext.a");
///
/// // returns once the organization is stored; provisioning runs on
/// let receipt = registry.save(&mut acme).await?;
/// let report = receipt.settle().await?;
/// println!("{} maintenance calls", report.outcomes.len());
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    orchestrator: Orchestrator,
}

impl Registry {
    pub fn new(
        store: Arc<dyn EntityStore>,
        gateway: Arc<dyn MaintenanceGateway>,
        sink: Arc<dyn NotificationSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::with_config(store, gateway, sink, config),
        }
    }

    /// Registry over an in-memory store, logging through `tracing`
    pub fn in_memory(gateway: Arc<dyn MaintenanceGateway>) -> Self {
        Self::new(
            Arc::new(InMemoryEntityStore::new()),
            gateway,
            Arc::new(TracingSink),
            OrchestratorConfig::default(),
        )
    }

    /// Connect the HTTP gateway described by `config`
    pub fn connect(config: RegistryConfig, store: Arc<dyn EntityStore>) -> Result<Self> {
        config.validate()?;
        let RegistryConfig {
            gateway,
            orchestrator,
        } = config;
        let gateway = HttpGateway::new(gateway)?;
        Ok(Self::new(
            store,
            Arc::new(gateway),
            Arc::new(TracingSink),
            orchestrator,
        ))
    }

    pub async fn save<R: Record>(&self, record: &mut R) -> Result<SaveReceipt> {
        self.orchestrator.save(record).await
    }

    pub async fn save_with<R: Record>(&self, record: &mut R, changes: &Changes) -> Result<SaveReceipt> {
        self.orchestrator.save_with(record, changes).await
    }

    pub async fn load<R: Record>(&self, key: &str) -> Result<Option<R>> {
        self.orchestrator.load(key).await
    }

    pub async fn find_existing(&self, kind: EntityKind, key: &str) -> Result<bool> {
        self.orchestrator.find_existing(kind, key).await
    }

    pub fn reset_password(&self, user: &User, new_user: bool) -> Result<ResetHandle> {
        self.orchestrator.reset_password(user, new_user)
    }

    /// Waits for several cycles at once, reports in the order given
    pub async fn settle_all(receipts: Vec<SaveReceipt>) -> Vec<Result<CycleReport>> {
        join_all(receipts.into_iter().map(SaveReceipt::settle)).await
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}
