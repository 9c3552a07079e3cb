//! CSV adapters for split shares and the attempt ledger.

pub mod attempt_writer;
pub mod share_reader;
pub mod share_writer;
