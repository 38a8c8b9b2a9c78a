use crate::config::OrchestratorConfig;
use crate::gateway::MaintenanceRequest;
use crate::model::CycleSnapshot;

/// Follow-up operations implied by a committed primary write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowUpPlan {
    pub requests: Vec<MaintenanceRequest>,
    /// User whose password reset fires once every request has settled
    pub reset_after_settle: Option<String>,
}

impl FollowUpPlan {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.reset_after_settle.is_none()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

/// Computes the follow-up set from the snapshot taken before the primary
/// write. Pure: the same snapshot always yields the same plan.
pub fn plan_follow_ups(snapshot: &CycleSnapshot, config: &OrchestratorConfig) -> FollowUpPlan {
    match snapshot {
        CycleSnapshot::Organization {
            key,
            was_new,
            pending_extensions,
        } => FollowUpPlan {
            requests: organization_requests(key, *was_new, pending_extensions, config),
            reset_after_settle: None,
        },
        CycleSnapshot::User {
            key,
            was_new,
            organizations,
        } => {
            let requests: Vec<MaintenanceRequest> = organizations
                .iter()
                .map(|organization| MaintenanceRequest::sync_user(key, organization))
                .collect();
            // with no membership there is nothing to wait for, and no reset
            let reset = *was_new && !requests.is_empty() && config.reset_password_for_new_users;
            FollowUpPlan {
                requests,
                reset_after_settle: reset.then(|| key.clone()),
            }
        }
        CycleSnapshot::Plain { .. } => FollowUpPlan::default(),
    }
}

fn organization_requests(
    organization: &str,
    was_new: bool,
    pending_extensions: &[String],
    config: &OrchestratorConfig,
) -> Vec<MaintenanceRequest> {
    match (was_new, pending_extensions.is_empty()) {
        (false, true) => Vec::new(),
        (false, false) => vec![MaintenanceRequest::install_extensions(
            organization,
            pending_extensions,
        )],
        (true, _) if config.combine_maintenance => vec![MaintenanceRequest::provision(
            organization,
            pending_extensions,
        )],
        (true, true) => vec![MaintenanceRequest::provision(organization, &[])],
        (true, false) => vec![
            MaintenanceRequest::provision(organization, &[]),
            MaintenanceRequest::install_extensions(organization, pending_extensions),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::OperationKind;

    fn org(was_new: bool, pending: &[&str]) -> CycleSnapshot {
        CycleSnapshot::Organization {
            key: "Acme".into(),
            was_new,
            pending_extensions: pending.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn user(was_new: bool, organizations: &[&str]) -> CycleSnapshot {
        CycleSnapshot::User {
            key: "u1".into(),
            was_new,
            organizations: organizations.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_new_organization_with_extensions_is_one_combined_request() {
        let plan = plan_follow_ups(&org(true, &["ext.a", "ext.b"]), &OrchestratorConfig::default());
        assert_eq!(plan.len(), 1);

        let request = &plan.requests[0];
        assert_eq!(request.operation, OperationKind::Provision);
        assert_eq!(request.payload.organization.as_deref(), Some("Acme"));
        assert!(request.payload.initialize);
        assert_eq!(
            request.payload.extensions.as_deref(),
            Some(r#"["ext.a","ext.b"]"#)
        );
    }

    #[test]
    fn test_split_maintenance_when_not_combined() {
        let config = OrchestratorConfig::default().combine_maintenance(false);
        let plan = plan_follow_ups(&org(true, &["ext.a"]), &config);
        let operations: Vec<_> = plan.requests.iter().map(|r| r.operation).collect();
        assert_eq!(
            operations,
            vec![OperationKind::Provision, OperationKind::InstallExtensions]
        );
        assert!(!plan.requests[1].payload.initialize);
    }

    #[test]
    fn test_existing_organization_without_new_extensions_needs_nothing() {
        let plan = plan_follow_ups(&org(false, &[]), &OrchestratorConfig::default());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_existing_organization_installs_only_pending() {
        let plan = plan_follow_ups(&org(false, &["ext.c"]), &OrchestratorConfig::default());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.requests[0].operation, OperationKind::InstallExtensions);
        assert_eq!(plan.requests[0].payload.extension_ids(), vec!["ext.c".to_string()]);
        assert!(!plan.requests[0].payload.initialize);
    }

    #[test]
    fn test_new_user_syncs_each_membership_then_resets() {
        let plan = plan_follow_ups(&user(true, &["orgX", "orgY"]), &OrchestratorConfig::default());
        assert_eq!(plan.len(), 2);
        assert!(plan.requests.iter().all(|r| r.operation == OperationKind::SyncUser));
        assert_eq!(plan.reset_after_settle.as_deref(), Some("u1"));
    }

    #[test]
    fn test_existing_user_syncs_without_reset() {
        let plan = plan_follow_ups(&user(false, &["orgX", "orgY"]), &OrchestratorConfig::default());
        assert_eq!(plan.len(), 2);
        assert!(plan.reset_after_settle.is_none());
    }

    #[test]
    fn test_new_user_without_memberships() {
        let plan = plan_follow_ups(&user(true, &[]), &OrchestratorConfig::default());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_reset_can_be_disabled() {
        let config = OrchestratorConfig::default().reset_password_for_new_users(false);
        let plan = plan_follow_ups(&user(true, &["orgX"]), &config);
        assert_eq!(plan.len(), 1);
        assert!(plan.reset_after_settle.is_none());
    }
}
