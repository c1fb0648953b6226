//! Target derivation for multi-day production plans.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Targets derived from a plan's stock, progress and end date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanTargets {
    pub remaining_units: u64,
    pub remaining_days: u64,
    /// 2 decimals. 0 once the plan has no days left.
    pub daily_target: f64,
    pub weekly_target: f64,
}

/// Derive targets as of `today`. The end date itself is not a working day.
pub fn plan_targets(total_stock: u64, finished_units: u64, end: NaiveDate, today: NaiveDate) -> PlanTargets {
    let remaining_units = total_stock.saturating_sub(finished_units);
    let remaining_days = (end - today).num_days().max(0) as u64;
    let daily_target = if remaining_days > 0 {
        round2(remaining_units as f64 / remaining_days as f64)
    } else {
        0.0
    };
    PlanTargets {
        remaining_units,
        remaining_days,
        daily_target,
        weekly_target: round2(daily_target * 7.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
