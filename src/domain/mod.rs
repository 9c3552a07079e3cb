//! Domain model: bills and their split, payment attempts, fees, and the
//! ports the application layer talks to.

pub mod attempt;
pub mod bill;
pub mod charge;
pub mod fee;
pub mod ids;
pub mod money;
pub mod ports;
pub mod split;
pub mod transition;
