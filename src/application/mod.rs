//! Application layer: the split engine, bill persistence and the settlement
//! coordinator that turns shares into processor charges.

pub mod bills;
pub mod settlement;
pub mod split_engine;
