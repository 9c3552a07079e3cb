use crate::domain::split::SplitState;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ShareRecord<'a> {
    member_id: &'a str,
    included: bool,
    value: Decimal,
    is_locked: bool,
}

/// Writes a split as CSV, one row per member in display order.
///
/// Values are rounded to two decimals for display only.
pub struct ShareWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ShareWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_split(&mut self, state: &SplitState) -> Result<()> {
        for share in &state.shares {
            self.writer.serialize(ShareRecord {
                member_id: share.member_id.as_str(),
                included: share.included,
                value: share.value.round_dp(2).normalize(),
                is_locked: share.is_locked,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
