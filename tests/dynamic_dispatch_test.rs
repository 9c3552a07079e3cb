use billsplit::domain::attempt::{AttemptStatus, PaymentAttempt};
use billsplit::domain::bill::Bill;
use billsplit::domain::ids::{MemberId, ParticipantId};
use billsplit::domain::money::Cents;
use billsplit::domain::ports::{AttemptStoreBox, BillStoreBox};
use billsplit::domain::split::{SplitMode, SplitState};
use billsplit::infrastructure::in_memory::{InMemoryAttemptStore, InMemoryBillStore};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let bill_store: BillStoreBox = Box::new(InMemoryBillStore::new());
    let attempt_store: AttemptStoreBox = Box::new(InMemoryAttemptStore::new());

    let bill = Bill::new(
        MemberId::new("alice"),
        dec!(60),
        "usd",
        NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
        SplitState {
            mode: SplitMode::Percentage,
            custom: false,
            total: dec!(60),
            shares: vec![],
        },
    );
    let bill_id = bill.id;
    let attempt = PaymentAttempt::new(
        ParticipantId::new(bill_id, MemberId::new("bob")),
        MemberId::new("bob"),
        Cents::new(3000),
        Cents::new(117),
        AttemptStatus::Scheduled,
    );
    let attempt_id = attempt.id;

    // Verify Send + Sync by spawning tasks
    let bs_handle = tokio::spawn(async move {
        bill_store.store(bill).await.unwrap();
        bill_store.get(bill_id).await.unwrap().unwrap()
    });

    let as_handle = tokio::spawn(async move {
        attempt_store.reserve(vec![attempt]).await.unwrap();
        attempt_store.get(attempt_id).await.unwrap().unwrap()
    });

    let retrieved_bill = bs_handle.await.unwrap();
    assert_eq!(retrieved_bill.id, bill_id);

    let retrieved_attempt = as_handle.await.unwrap();
    assert_eq!(retrieved_attempt.total_cents, Cents::new(3117));
}
