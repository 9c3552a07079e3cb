mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_split_equal_percentages() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args(["split", "--total", "120", "--members", "alice,bob,carol,dan"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("member_id,included,value,is_locked"))
        .stdout(predicate::str::contains("alice,true,25,false"))
        .stdout(predicate::str::contains("dan,true,25,false"));

    Ok(())
}

#[test]
fn test_split_set_member_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "split",
        "--total",
        "120",
        "--members",
        "alice,bob,carol,dan",
        "--set",
        "alice=40",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("alice,true,40,false"))
        .stdout(predicate::str::contains("bob,true,20,false"))
        .stderr(predicate::str::contains("unbalanced").not());

    Ok(())
}

#[test]
fn test_split_fixed_with_exclusion() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "split",
        "--total",
        "100",
        "--members",
        "alice,bob,carol,dan",
        "--mode",
        "fixed",
        "--exclude",
        "dan",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("alice,true,33,false"))
        .stdout(predicate::str::contains("dan,false,0,false"));

    Ok(())
}

#[test]
fn test_split_from_csv_warns_when_unbalanced() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shares.csv");
    common::write_shares_csv(&path, &[("alice", true, "50"), ("bob", true, "30")])?;

    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args(["split", "--total", "80", "--input"]).arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("alice,true,50,false"))
        .stderr(predicate::str::contains("WARNING: split is unbalanced (80% allocated)"));

    Ok(())
}

#[test]
fn test_split_requires_members_or_input() {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args(["split", "--total", "80"]);
    cmd.assert().failure();
}

#[test]
fn test_pay_prints_ledger() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "pay", "--owner", "alice", "--total", "100", "--members", "bob", "--mode", "fixed",
        "--payer", "bob",
    ]);

    // Fixed split of 100 over two members: bob owes 5000 cents, default fee 2.9% + 30.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "attempt_id,participant,payer,amount_cents,fee_cents,total_cents,status,provider_intent_id,group_key,failure_code",
        ))
        .stdout(predicate::str::contains("bob,bob,5000,175,5175,PROCESSING,pi_1,,"))
        .stderr(predicate::str::contains("Payment started: intent pi_1"));

    Ok(())
}

#[test]
fn test_pay_declined_records_failure() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "pay", "--owner", "alice", "--total", "100", "--members", "bob", "--mode", "fixed",
        "--payer", "bob", "--decline",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("FAILED,,,card_declined"))
        .stderr(predicate::str::contains("Payment error: Payment could not be started"));

    Ok(())
}

#[test]
fn test_pay_group_books_fee_on_leader() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "pay", "--owner", "alice", "--total", "90", "--members", "bob,carol", "--mode",
        "fixed", "--payer", "bob", "--group", "bob,carol",
    ]);

    // 3000 + 3000 = 6000, fee 2.9% + 30 = 204 charged once.
    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains(",bob,bob,3000,204,3204,PROCESSING,pi_1,"));
    assert!(stdout.contains(",carol,bob,3000,0,3000,PROCESSING,,"));

    Ok(())
}

#[test]
fn test_pay_rejects_owner_as_payer() {
    let mut cmd = Command::new(cargo_bin!("billsplit"));
    cmd.args([
        "pay", "--owner", "alice", "--total", "100", "--members", "bob", "--payer", "alice",
    ]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Payment error: Bill owner alice cannot pay"));
}
