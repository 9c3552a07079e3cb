//! Runtime configuration.
//!
//! Every section has defaults, so a settings file only needs the fields it
//! overrides.

use crate::domain::fee::FeeSchedule;
use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What `set_inclusion` does to a custom percentage split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomInclusion {
    /// Keep the remaining members' values as they are; the admin fixes them.
    #[default]
    Retain,
    /// Scale the included members back to 100%.
    Proportional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub member_value_min: Decimal,
    pub member_value_max: Decimal,
    pub drag_min: Decimal,
    pub drag_max: Decimal,
    pub tolerance: Decimal,
    pub custom_inclusion: CustomInclusion,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            member_value_min: dec!(1),
            member_value_max: dec!(99),
            drag_min: dec!(5),
            drag_max: dec!(95),
            tolerance: dec!(0.01),
            custom_inclusion: CustomInclusion::Retain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub currency: String,
    /// Decimal places of the currency's minor unit.
    pub minor_unit_scale: u32,
    pub fee: FeeSchedule,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            minor_unit_scale: 2,
            fee: FeeSchedule::default(),
        }
    }
}

/// How a commit of an unbalanced custom percentage split is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnbalancedPolicy {
    /// Scale the split to 100% before persisting.
    #[default]
    Normalize,
    /// Refuse the save.
    Reject,
    /// Persist as-is and mark the bill as needing attention.
    Flag,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillConfig {
    pub unbalanced_policy: UnbalancedPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub split: SplitConfig,
    pub settlement: SettlementConfig,
    pub bills: BillConfig,
}

impl Settings {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
