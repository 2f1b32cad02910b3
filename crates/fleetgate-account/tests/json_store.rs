//! The account store against the JSON file persister, across "restarts".

use std::sync::Arc;

use fleetgate_account::{
    AccountStore, BOOTSTRAP_PASSWORD, BOOTSTRAP_USER, JsonFileAccountPersister,
};
use fleetgate_protocol::{Permission, PermissionSet};

async fn open(home: &std::path::Path) -> AccountStore {
    AccountStore::load(Arc::new(JsonFileAccountPersister::new(home)))
        .await
        .expect("store should load")
}

#[tokio::test]
async fn test_first_start_writes_bootstrap_account_file() {
    let home = tempfile::tempdir().unwrap();

    let store = open(home.path()).await;

    assert_eq!(
        store.verify(BOOTSTRAP_USER, BOOTSTRAP_PASSWORD),
        Some(PermissionSet::all())
    );
    let raw = std::fs::read_to_string(home.path().join("data/accounts.json")).unwrap();
    assert!(raw.contains("\"guest\""));
    assert!(raw.contains("MANAGE_USERS"));
}

#[tokio::test]
async fn test_changes_survive_restart() {
    let home = tempfile::tempdir().unwrap();
    {
        let mut store = open(home.path()).await;
        store
            .create("alice", "a-pw", PermissionSet::from([Permission::ReadData]))
            .await
            .unwrap();
        store.set_password(BOOTSTRAP_USER, "rotated").await.unwrap();
    }

    let store = open(home.path()).await;

    assert_eq!(store.len(), 2);
    assert_eq!(
        store.verify("alice", "a-pw"),
        Some(PermissionSet::from([Permission::ReadData]))
    );
    assert_eq!(store.verify(BOOTSTRAP_USER, BOOTSTRAP_PASSWORD), None);
    assert!(store.verify(BOOTSTRAP_USER, "rotated").is_some());
}

#[tokio::test]
async fn test_removing_every_account_bootstraps_again_on_restart() {
    let home = tempfile::tempdir().unwrap();
    {
        let mut store = open(home.path()).await;
        store.remove(BOOTSTRAP_USER).await.unwrap();
        assert!(store.is_empty());
    }

    let store = open(home.path()).await;

    assert!(store.find(BOOTSTRAP_USER).is_some());
}

#[tokio::test]
async fn test_malformed_account_file_fails_load() {
    let home = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(home.path().join("data")).unwrap();
    std::fs::write(home.path().join("data/accounts.json"), "[{\"user_name\": 5}]").unwrap();

    let result = AccountStore::load(Arc::new(JsonFileAccountPersister::new(home.path()))).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_back_to_back_changes_land_in_order() {
    let home = tempfile::tempdir().unwrap();
    {
        let mut store = open(home.path()).await;
        for i in 0..10 {
            store
                .set_password(BOOTSTRAP_USER, &format!("pw-{i}"))
                .await
                .unwrap();
        }
    }

    let store = open(home.path()).await;

    assert!(store.verify(BOOTSTRAP_USER, "pw-9").is_some());
}
