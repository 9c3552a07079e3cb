#![allow(dead_code)]

use billsplit::application::settlement::SettlementCoordinator;
use billsplit::config::SettlementConfig;
use billsplit::domain::bill::Bill;
use billsplit::domain::ids::MemberId;
use billsplit::domain::money::Cents;
use billsplit::domain::ports::BillStore;
use billsplit::domain::split::{MemberShare, SplitMode, SplitState};
use billsplit::infrastructure::in_memory::{InMemoryAttemptStore, InMemoryBillStore};
use billsplit::infrastructure::simulated::SimulatedProcessor;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;

/// `round(0.03 * amount)`, easy to check by hand.
pub fn three_percent(amount: Cents) -> Cents {
    Cents::new((amount.value() * 3 + 50) / 100)
}

pub struct Harness {
    pub bills: InMemoryBillStore,
    pub attempts: InMemoryAttemptStore,
    pub processor: SimulatedProcessor,
    pub coordinator: SettlementCoordinator,
}

pub fn harness() -> Harness {
    let bills = InMemoryBillStore::new();
    let attempts = InMemoryAttemptStore::new();
    let processor = SimulatedProcessor::new();
    let coordinator = SettlementCoordinator::new(
        Box::new(bills.clone()),
        Box::new(attempts.clone()),
        Box::new(processor.clone()),
        SettlementConfig::default(),
    )
    .with_fee_calculator(three_percent);
    Harness {
        bills,
        attempts,
        processor,
        coordinator,
    }
}

/// Stores an active bill whose shares are fixed amounts.
pub async fn fixed_bill(bills: &InMemoryBillStore, owner: &str, shares: &[(&str, Decimal)]) -> Bill {
    let total: Decimal = shares.iter().map(|(_, v)| *v).sum();
    let bill = Bill::new(
        MemberId::new(owner),
        total,
        "usd",
        NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
        SplitState {
            mode: SplitMode::Fixed,
            custom: true,
            total,
            shares: shares
                .iter()
                .map(|(m, v)| MemberShare::new(MemberId::new(*m), true, *v))
                .collect(),
        },
    );
    bills.store(bill.clone()).await.unwrap();
    bill
}

pub fn write_shares_csv(path: &Path, rows: &[(&str, bool, &str)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["member_id", "included", "value"])?;
    for (member, included, value) in rows {
        wtr.write_record([*member, &included.to_string(), *value])?;
    }
    wtr.flush()?;
    Ok(())
}
