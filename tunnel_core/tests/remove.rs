use tunnel_core::{ProfileError, SaveTarget};

mod common;
use common::journal::{delete, down};
use common::{pid, profile, Harness};

const C1: &str = "[Interface]\nAddress = 10.0.0.2/32\n";

#[tokio::test]
async fn remove_connected_profile_tears_down_before_deleting() {
    let h = Harness::new().with_profile("A", "Home", C1).await;
    h.controller.connect(&pid("A")).await.unwrap();
    h.journal.clear();

    h.controller
        .remove(&pid("A"))
        .await
        .expect("remove should succeed");

    assert_eq!(h.journal.calls(), vec![down("A", C1), delete("A")]);
    assert!(h.controller.list_profiles().await.is_empty());
    assert!(h.store.record("A").is_none());
}

#[tokio::test]
async fn remove_disconnected_profile_only_deletes() {
    let h = Harness::new().with_profile("A", "Home", C1).await;

    h.controller.remove(&pid("A")).await.unwrap();

    assert_eq!(h.journal.calls(), vec![delete("A")]);
    assert!(h.state_of("A").await.is_none());
}

#[tokio::test]
async fn remove_ignores_teardown_failures() {
    let h = Harness::new().with_profile("A", "Home", C1).await;
    h.controller.connect(&pid("A")).await.unwrap();
    h.adapter.fail_down();

    h.controller.remove(&pid("A")).await.unwrap();
    assert!(h.controller.list_profiles().await.is_empty());
}

#[tokio::test]
async fn remove_unknown_profile_fails() {
    let h = Harness::new();

    let err = h.controller.remove(&pid("ghost")).await.unwrap_err();
    assert!(matches!(err, ProfileError::UnknownProfile(_)));
    assert!(h.journal.calls().is_empty());
}

#[tokio::test]
async fn failed_store_delete_still_removes_locally() {
    let h = Harness::new().with_profile("A", "Home", C1).await;
    h.store.fail_deletes(true);

    let err = h
        .controller
        .remove(&pid("A"))
        .await
        .expect_err("store failure must be reported");

    assert!(matches!(err, ProfileError::PersistenceFailure(_)));
    assert!(
        h.controller.list_profiles().await.is_empty(),
        "local removal completes regardless of the store"
    );
}

#[tokio::test]
async fn remove_preserves_relative_order() {
    let h = Harness::new();
    for id in ["a", "b", "c", "d"] {
        h.controller
            .save(SaveTarget::Create, profile(id, id, C1))
            .await
            .unwrap();
    }

    h.controller.remove(&pid("b")).await.unwrap();
    h.controller.remove(&pid("d")).await.unwrap();

    assert_eq!(h.controller.list_profiles().await.ids(), vec![pid("a"), pid("c")]);
}

#[tokio::test]
async fn removed_id_can_be_created_again() {
    let h = Harness::new().with_profile("A", "Home", C1).await;
    h.controller.remove(&pid("A")).await.unwrap();

    h.controller
        .save(SaveTarget::Create, profile("A", "Home again", C1))
        .await
        .expect("id is free after removal");

    let snapshot = h.controller.list_profiles().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "Home again");
}
