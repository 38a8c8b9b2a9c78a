/// Registry API tests
///
/// Loading, patching and catalog records through the high-level client.
/// Run with: cargo test --test registry_api_tests
use registrysync::{
    Changes, DatabaseServer, EntityKind, EntityStatus, Extension, GlobalPrivilege,
    OperationKind, Organization, OrganizationMembership, Record, RecordingGateway, Registry,
    RegistryError, User,
};
use serde_json::json;
use std::sync::Arc;

fn registry() -> (Registry, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::new());
    (Registry::in_memory(gateway.clone()), gateway)
}

fn changes(value: serde_json::Value) -> Changes {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_loaded_records_are_ready_with_committed_relations() {
    let (registry, _) = registry();
    let mut org = Organization::new("Acme", "customers", 10);
    org.attach_extension("ext.a");
    registry.save(&mut org).await.unwrap().settle().await.unwrap();

    let loaded: Organization = registry.load("Acme").await.unwrap().unwrap();
    assert_eq!(loaded.status(), EntityStatus::Ready);
    assert_eq!(loaded.meta().version(), Some(1));
    assert_eq!(loaded.extensions().len(), 1);
    assert!(loaded.extensions().iter().all(|a| !a.is_new()));
    assert!(loaded.pending_extensions().is_empty());

    let missing: Option<Organization> = registry.load("Nope").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_saving_a_clean_record_is_refused() {
    let (registry, gateway) = registry();
    let mut org = Organization::new("Acme", "customers", 10);
    registry.save(&mut org).await.unwrap().settle().await.unwrap();

    let err = registry.save(&mut org).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidState(_)));
    assert!(!err.is_primary_write());
    assert_eq!(gateway.call_count().await, 1);
}

#[tokio::test]
async fn test_patch_then_save() {
    let (registry, _) = registry();
    let mut org = Organization::new("Acme", "customers", 10);
    registry.save(&mut org).await.unwrap();

    let mut loaded: Organization = registry.load("Acme").await.unwrap().unwrap();
    let receipt = registry
        .save_with(&mut loaded, &changes(json!({ "licenses": 40, "description": "Main tenant" })))
        .await
        .unwrap();
    assert_eq!(receipt.version(), 2);
    assert_eq!(receipt.follow_ups.dispatched(), 0);

    let reloaded: Organization = registry.load("Acme").await.unwrap().unwrap();
    assert_eq!(reloaded.licenses(), 40);
    assert_eq!(reloaded.description(), Some("Main tenant"));
}

#[tokio::test]
async fn test_key_is_read_only_once_committed() {
    let (registry, _) = registry();
    let mut org = Organization::new("Acme", "customers", 10);
    registry.save(&mut org).await.unwrap();

    let err = registry
        .save_with(&mut org, &changes(json!({ "name": "Globex" })))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::ReadOnlyAttribute {
            kind: EntityKind::Organization,
            attribute: "name".into(),
        }
    );

    let err = registry
        .save_with(&mut org, &changes(json!({ "extensions": [] })))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ReadOnlyAttribute { .. }));
    assert_eq!(org.status(), EntityStatus::Ready);
}

#[tokio::test]
async fn test_find_existing() {
    let (registry, _) = registry();
    assert!(!registry.find_existing(EntityKind::User, "u1").await.unwrap());

    let mut user = User::new("u1", "u1@example.com");
    registry.save(&mut user).await.unwrap();
    assert!(registry.find_existing(EntityKind::User, "u1").await.unwrap());
    assert!(!registry.find_existing(EntityKind::Organization, "u1").await.unwrap());
}

#[tokio::test]
async fn test_catalog_records_have_no_follow_ups() {
    let (registry, gateway) = registry();

    let mut server = DatabaseServer::new("db1", "db1.internal", 5432, "admin", "secret");
    let mut extension = Extension::new("ext.a").with_description("Accounting");
    let mut privilege = GlobalPrivilege::new("admin.users").with_module("admin");

    for receipt in [
        registry.save(&mut server).await.unwrap(),
        registry.save(&mut extension).await.unwrap(),
        registry.save(&mut privilege).await.unwrap(),
    ] {
        assert_eq!(receipt.follow_ups.dispatched(), 0);
    }
    assert_eq!(gateway.call_count().await, 0);

    let loaded: DatabaseServer = registry.load("db1").await.unwrap().unwrap();
    assert_eq!(loaded.port(), 5432);
    assert!(!format!("{:?}", loaded).contains("secret"));
}

#[tokio::test]
async fn test_database_server_requires_connection_attributes() {
    let (registry, _) = registry();
    let mut server = DatabaseServer::new("db1", "", 5432, "admin", "secret");
    let err = registry.save(&mut server).await.unwrap_err();
    assert!(matches!(err, RegistryError::Validation { .. }));
    assert!(!registry.find_existing(EntityKind::DatabaseServer, "db1").await.unwrap());
}

#[tokio::test]
async fn test_membership_username_follows_user_id() {
    let (registry, gateway) = registry();
    let mut user = User::new("jdoe", "jdoe@example.com");
    user.add_organization(OrganizationMembership::new("Acme"));
    user.add_organization(OrganizationMembership::new("Globex").with_username("john"));
    user.grant_privilege("admin.users");

    registry.save(&mut user).await.unwrap().settle().await.unwrap();
    let loaded: User = registry.load("jdoe").await.unwrap().unwrap();
    let usernames: Vec<_> = loaded.organizations().iter().map(|m| m.username()).collect();
    assert_eq!(usernames, vec!["jdoe", "john"]);
    assert!(loaded.has_privilege("admin.users"));

    assert_eq!(gateway.calls_for(OperationKind::SyncUser).await.len(), 2);
    assert_eq!(gateway.calls_for(OperationKind::ResetPassword).await.len(), 1);
}

#[tokio::test]
async fn test_settle_all() {
    let (registry, gateway) = registry();
    let mut first = Organization::new("Acme", "customers", 10);
    let mut second = Organization::new("Globex", "customers", 5);
    second.attach_extension("ext.b");

    let receipts = vec![
        registry.save(&mut first).await.unwrap(),
        registry.save(&mut second).await.unwrap(),
    ];
    let reports = Registry::settle_all(receipts).await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].as_ref().unwrap().key, "Acme");
    assert_eq!(reports[1].as_ref().unwrap().key, "Globex");
    assert_eq!(gateway.calls_for(OperationKind::Provision).await.len(), 2);
}
