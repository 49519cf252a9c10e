//! Operation journal follows committed ledger writes

mod common;

use common::*;
use custody_ledger::crypto::commit;
use custody_ledger::directory::{DisplayProfile, IdentityDirectory};
use custody_ledger::journal::{verify_journal_file, Journal};
use tempfile::tempdir;

#[tokio::test]
async fn test_committed_operations_are_journaled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal").join("custody.jsonl");
    let journal = Journal::open(&path).await.unwrap();
    let service = setup_test_service().await.with_journal(journal.clone());

    let watch = create_watch(&service).await;
    service
        .accept_handover(&carrier(), watch.id, "H1", commit("H2"), "Warehouse-X")
        .await
        .unwrap();
    service
        .claim_ownership(&consumer(), watch.id, "S0", "Alice", "City-Y")
        .await
        .unwrap();
    service
        .claim_ownership(&consumer(), watch.id, "S0", "Alice", "City-Y")
        .await
        .unwrap();

    let entries = journal.entries().await.unwrap();
    let operations: Vec<&str> = entries.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(
        operations,
        vec!["genesis", "create_asset", "accept_handover", "claim_ownership"]
    );
    assert_eq!(verify_journal_file(&path).unwrap(), 4);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("\"H1\""));
    assert!(!raw.contains("\"S0\""));
}

#[tokio::test]
async fn test_failed_operations_are_not_journaled() {
    let dir = tempdir().unwrap();
    let journal = Journal::open(dir.path().join("custody.jsonl")).await.unwrap();
    let service = setup_test_service().await.with_journal(journal.clone());
    let watch = create_watch(&service).await;
    let before = journal.entry_count().await;

    assert!(service
        .accept_handover(&carrier(), watch.id, "wrong", commit("H2"), "Dock")
        .await
        .is_err());
    assert_eq!(journal.entry_count().await, before);
}

#[tokio::test]
async fn test_displayed_history_uses_directory() {
    let directory = IdentityDirectory::from_profiles([(
        "0xFactory".to_string(),
        DisplayProfile {
            name: "Acme Watchworks".to_string(),
            email: Some("ops@acme.example".to_string()),
            document_refs: vec![],
        },
    )]);
    let service = setup_test_service().await.with_directory(directory);
    let watch = create_watch(&service).await;
    service
        .accept_handover(&carrier(), watch.id, "H1", commit("H2"), "Dock")
        .await
        .unwrap();

    let history = service.displayed_history(watch.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[0].actor_profile.as_ref().map(|p| p.name.as_str()),
        Some("Acme Watchworks")
    );
    assert!(history[1].actor_profile.is_none());
}

#[tokio::test]
async fn test_concurrent_writes_journal_in_commit_order() {
    let dir = tempdir().unwrap();
    let journal = Journal::open(dir.path().join("custody.jsonl")).await.unwrap();
    let service = setup_test_service().await.with_journal(journal.clone());
    let watch = create_watch(&service).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .record_verification(&principal(&format!("0xinspector{}", i)), watch.id, "Port", "")
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let ledger_order: Vec<String> = service
        .get_verifications(watch.id)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.verifier.to_string())
        .collect();
    let journal_order: Vec<String> = journal
        .entries()
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == "record_verification")
        .map(|e| e.actor)
        .collect();
    assert_eq!(ledger_order.len(), 8);
    assert_eq!(journal_order, ledger_order);
}
