use crate::domain::split::MemberShare;
use crate::error::{BillSplitError, Result};
use std::io::Read;

/// Reads member shares from a CSV source.
///
/// Expects a `member_id,included,value` header; an optional `is_locked`
/// column defaults to `false`. Rows are yielded in file order, which becomes
/// the split's display order.
pub struct ShareReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ShareReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn shares(self) -> impl Iterator<Item = Result<MemberShare>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillSplitError::from))
    }
}
