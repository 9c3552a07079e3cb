#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use billsplit::domain::attempt::AttemptStatus;
use billsplit::domain::ports::{AttemptStore, BillStore};
use billsplit::infrastructure::rocksdb::RocksDBStore;
use std::process::Command;
use tempfile::tempdir;

fn pay(db_path: &std::path::Path) -> String {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "pay", "--owner", "alice", "--total", "60", "--members", "bob", "--mode", "fixed",
        "--payer", "bob",
    ])
    .arg("--db-path")
    .arg(db_path);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: one bill, one attempt
    let stdout1 = pay(&db_path);
    assert_eq!(stdout1.matches("PROCESSING").count(), 1);

    // 2. Second run against the same DB sees the first run's attempt as well
    let stdout2 = pay(&db_path);
    assert_eq!(stdout2.matches("PROCESSING").count(), 2);
}

#[tokio::test]
async fn test_reopened_store_keeps_in_flight_index() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    pay(&db_path);

    let store = RocksDBStore::open(&db_path).unwrap();
    let bills = BillStore::all(&store).await.unwrap();
    assert_eq!(bills.len(), 1);

    let attempts = AttemptStore::all(&store).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Processing);

    // The reopened index still blocks a second attempt for the same share.
    let mut duplicate = attempts[0].clone();
    duplicate.id = billsplit::domain::ids::AttemptId::new();
    assert!(store.reserve(vec![duplicate]).await.is_err());
}
