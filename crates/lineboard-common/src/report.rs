//! Period reports: the aggregates of [`crate::aggregate`], restricted to a
//! time window and scaled to the window's length.
//!
//! A window always ends at `now` and starts at midnight of the current day,
//! moved back by the period. Records without a timestamp fall outside every
//! window.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::grade::{DefectStatus, EfficiencyStatus};
use crate::record::{DefectRecord, LineNumber, LineTargets, ProductionRecord};

/// Per-day target for a line with no configured target.
pub const FALLBACK_LINE_TARGET: u64 = 800;

/// Accepted defect rate, as a fraction of produced pieces.
const DEFECT_RATE_TARGET: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Today,
    Weekly,
    Monthly,
    Annually,
}

impl ReportPeriod {
    /// Unrecognised names fall back to `Today`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "annually" => Self::Annually,
            _ => Self::Today,
        }
    }

    /// How many daily targets fit in the period.
    pub fn target_multiplier(self) -> u64 {
        match self {
            Self::Today => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Annually => 365,
        }
    }

    /// The window ending at `now`, with day boundaries in `now`'s timezone.
    pub fn window<Tz: TimeZone>(self, now: &DateTime<Tz>) -> ReportWindow {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let start = match self {
            Self::Today => Some(midnight),
            Self::Weekly => midnight.checked_sub_days(Days::new(7)),
            Self::Monthly => midnight.checked_sub_months(Months::new(1)),
            Self::Annually => midnight.checked_sub_months(Months::new(12)),
        }
        .unwrap_or(midnight);
        // A DST gap can swallow local midnight; read the wall time as UTC then.
        let start = start
            .and_local_timezone(now.timezone())
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| start.and_utc());
        ReportWindow {
            start,
            end: now.with_timezone(&Utc),
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Today => "today",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Annually => "annually",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    LineEfficiency,
    EmployeeEfficiency,
    TargetAchievement,
    DefectRate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown report type: {0}")]
pub struct UnknownReportKind(pub String);

impl FromStr for ReportKind {
    type Err = UnknownReportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line-efficiency" => Ok(Self::LineEfficiency),
            "employee-efficiency" => Ok(Self::EmployeeEfficiency),
            "target-achievement" => Ok(Self::TargetAchievement),
            "defect-rate" => Ok(Self::DefectRate),
            other => Err(UnknownReportKind(other.to_string())),
        }
    }
}

/// Inclusive `[start, end]` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn contains(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        timestamp.is_some_and(|ts| self.start <= ts && ts <= self.end)
    }

    /// True when the date span `[first, last]` touches the window's UTC days.
    pub fn overlaps_days(&self, first: NaiveDate, last: NaiveDate) -> bool {
        first <= self.end.date_naive() && last >= self.start.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowStatus {
    Efficiency(EfficiencyStatus),
    Defects(DefectStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub category: String,
    pub value: u64,
    pub target: u64,
    pub percentage: f64,
    pub status: RowStatus,
}

/// The subset of a production plan that reports need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub product: String,
    pub total_stock: u64,
    pub finished_units: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percent of `target` reached, capped at 100, 1 decimal.
fn achievement(value: u64, target: u64) -> f64 {
    if target == 0 {
        return 0.0;
    }
    round1((value as f64 / target as f64 * 100.0).min(100.0))
}

fn efficiency_row(category: String, value: u64, target: u64) -> ReportRow {
    let percentage = achievement(value, target);
    ReportRow {
        category,
        value,
        target,
        percentage,
        status: RowStatus::Efficiency(EfficiencyStatus::from_percent(percentage)),
    }
}

/// One row per line with output inside the window, then `Unassigned`.
pub fn line_efficiency_report(
    records: &[ProductionRecord],
    targets: &LineTargets,
    period: ReportPeriod,
    window: &ReportWindow,
) -> Vec<ReportRow> {
    let mut per_line: BTreeMap<LineNumber, u64> = BTreeMap::new();
    let mut unassigned: Option<u64> = None;
    for record in records.iter().filter(|r| window.contains(r.timestamp)) {
        let total = match record.line {
            Some(line) => per_line.entry(line).or_insert(0),
            None => unassigned.get_or_insert(0),
        };
        *total = total.saturating_add(record.pcs);
    }

    let scale = period.target_multiplier();
    let mut rows: Vec<ReportRow> = per_line
        .into_iter()
        .map(|(line, actual)| {
            let daily = targets.get(line).unwrap_or(FALLBACK_LINE_TARGET);
            efficiency_row(format!("Line {}", line), actual, daily.saturating_mul(scale))
        })
        .collect();
    if let Some(actual) = unassigned {
        rows.push(efficiency_row(
            "Unassigned".to_string(),
            actual,
            FALLBACK_LINE_TARGET.saturating_mul(scale),
        ));
    }
    rows
}

/// One row per plan running at any point of the window.
pub fn target_achievement_report(plans: &[PlanProgress], window: &ReportWindow) -> Vec<ReportRow> {
    plans
        .iter()
        .filter(|p| window.overlaps_days(p.start_date, p.end_date))
        .map(|p| efficiency_row(p.product.clone(), p.finished_units, p.total_stock))
        .collect()
}

/// A single overall row: defective units against pieces produced in the window.
pub fn defect_rate_report(
    defects: &[DefectRecord],
    records: &[ProductionRecord],
    window: &ReportWindow,
) -> Vec<ReportRow> {
    let defective = defects
        .iter()
        .filter(|d| window.contains(d.timestamp) && d.is_defective())
        .count() as u64;
    let produced = records
        .iter()
        .filter(|r| window.contains(r.timestamp))
        .fold(0u64, |acc, r| acc.saturating_add(r.pcs));
    let rate = crate::aggregate::defect_rate(defective, produced);
    vec![ReportRow {
        category: "Overall Production".to_string(),
        value: defective,
        target: (produced as f64 * DEFECT_RATE_TARGET).round() as u64,
        percentage: rate,
        status: RowStatus::Defects(DefectStatus::from_rate(rate)),
    }]
}
