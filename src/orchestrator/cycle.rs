use crate::core::{EntityKind, RegistryError, Result};
use crate::model::CycleSnapshot;
use uuid::Uuid;

/// Phase of one save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePhase {
    Initiated,
    PrimaryPending,
    PrimaryFailed,
    PrimaryCommitted,
    FollowUpsDispatched,
    FollowUpsSettling,
    Complete,
}

impl CyclePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CyclePhase::PrimaryFailed | CyclePhase::Complete)
    }

    fn can_advance_to(self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        matches!(
            (self, next),
            (Initiated, PrimaryPending)
                | (PrimaryPending, PrimaryFailed)
                | (PrimaryPending, PrimaryCommitted)
                | (PrimaryCommitted, FollowUpsDispatched)
                | (PrimaryCommitted, Complete)
                | (FollowUpsDispatched, FollowUpsSettling)
                | (FollowUpsSettling, Complete)
        )
    }
}

/// One save invocation, from primary-write initiation to settlement of
/// its follow-ups. A new save always starts a new cycle.
#[derive(Debug, Clone)]
pub struct Cycle {
    id: Uuid,
    kind: EntityKind,
    key: String,
    phase: CyclePhase,
    history: Vec<CyclePhase>,
}

impl Cycle {
    pub fn new(snapshot: &CycleSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: snapshot.kind(),
            key: snapshot.key().to_string(),
            phase: CyclePhase::Initiated,
            history: vec![CyclePhase::Initiated],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Every phase the cycle has been through, in order
    pub fn history(&self) -> &[CyclePhase] {
        &self.history
    }

    pub fn advance(&mut self, next: CyclePhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(RegistryError::InvalidState(format!(
                "save cycle {} cannot move from {:?} to {:?}",
                self.id, self.phase, next
            )));
        }
        tracing::debug!(cycle_id = %self.id, from = ?self.phase, to = ?next, "cycle phase");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }
}
