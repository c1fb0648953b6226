//! Production aggregation.
//!
//! Every function here is a pure reduction over a point-in-time slice of
//! records. Nothing is cached: callers build a fresh [`AggregateSnapshot`]
//! per request and drop it once delivered. Sums saturate instead of
//! overflowing so no input can make aggregation panic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grade::{DefectStatus, EfficiencyStatus};
use crate::record::{DefectRecord, LineNumber, LineTargets, ProductionRecord};

/// Per-line and overall totals derived from one fetch of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Produced pieces for every targeted line, 0 for lines with no records.
    pub per_line: BTreeMap<LineNumber, u64>,
    /// Pieces produced on untargeted or unassigned lines.
    pub untracked: u64,
    pub overall_produced: u64,
    pub overall_target: u64,
    pub remaining: u64,
    /// Uncapped; see [`AggregateSnapshot::percent_capped`].
    pub percent_complete: f64,
    pub record_count: usize,
}

impl AggregateSnapshot {
    /// Percent complete clamped to `cap` for display. `None` leaves it as is.
    pub fn percent_capped(&self, cap: Option<f64>) -> f64 {
        match cap {
            Some(cap) => self.percent_complete.min(cap),
            None => self.percent_complete,
        }
    }

    pub fn is_target_met(&self) -> bool {
        self.overall_target > 0 && self.remaining == 0
    }

    pub fn line_total(&self, line: LineNumber) -> Option<u64> {
        self.per_line.get(&line).copied()
    }
}

pub fn compute_snapshot(records: &[ProductionRecord], targets: &LineTargets) -> AggregateSnapshot {
    let mut per_line: BTreeMap<LineNumber, u64> = targets.iter().map(|t| (t.line, 0)).collect();
    let mut untracked = 0u64;
    let mut overall_produced = 0u64;

    for record in records {
        overall_produced = overall_produced.saturating_add(record.pcs);
        match record.line.and_then(|line| per_line.get_mut(&line)) {
            Some(total) => *total = total.saturating_add(record.pcs),
            None => untracked = untracked.saturating_add(record.pcs),
        }
    }

    let overall_target = targets.total();

    AggregateSnapshot {
        per_line,
        untracked,
        overall_produced,
        overall_target,
        remaining: overall_target.saturating_sub(overall_produced),
        percent_complete: percent_of(overall_produced, overall_target),
        record_count: records.len(),
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Defect rate in percent, rounded to 2 decimals. 0 when nothing was produced.
pub fn defect_rate(defect_count: u64, produced: u64) -> f64 {
    if produced == 0 {
        return 0.0;
    }
    round2(percent_of(defect_count, produced))
}

/// Defect rate over inspected units: defective units / produced.
pub fn compute_defect_rate(defects: &[DefectRecord], produced: u64) -> f64 {
    let defective = defects.iter().filter(|d| d.is_defective()).count() as u64;
    defect_rate(defective, produced)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectSummary {
    pub inspected: usize,
    pub defective_units: u64,
    pub defect_entries: u64,
    pub produced: u64,
    pub rate: f64,
    pub status: DefectStatus,
    /// Defect entries per garment section code.
    pub by_section: BTreeMap<u16, u64>,
    /// Defect entries per defect type code.
    pub by_type: BTreeMap<u16, u64>,
}

pub fn compute_defect_summary(defects: &[DefectRecord], produced: u64) -> DefectSummary {
    let mut by_section = BTreeMap::new();
    let mut by_type = BTreeMap::new();
    let mut defect_entries = 0u64;
    let mut defective_units = 0u64;

    for record in defects {
        if record.is_defective() {
            defective_units += 1;
        }
        for entry in &record.defects {
            defect_entries += 1;
            *by_section.entry(entry.section).or_insert(0) += 1;
            *by_type.entry(entry.defect_type).or_insert(0) += 1;
        }
    }

    let rate = defect_rate(defective_units, produced);
    DefectSummary {
        inspected: defects.len(),
        defective_units,
        defect_entries,
        produced,
        rate,
        status: DefectStatus::from_rate(rate),
        by_section,
        by_type,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePerformance {
    pub line: LineNumber,
    pub target: u64,
    pub actual: u64,
    /// Whole percent of target reached.
    pub efficiency: u64,
    pub status: EfficiencyStatus,
}

/// One row per targeted line, in line order.
pub fn line_performance(records: &[ProductionRecord], targets: &LineTargets) -> Vec<LinePerformance> {
    let snapshot = compute_snapshot(records, targets);
    targets
        .iter()
        .map(|t| {
            let actual = snapshot.line_total(t.line).unwrap_or(0);
            let percent = percent_of(actual, t.target);
            LinePerformance {
                line: t.line,
                target: t.target,
                actual,
                efficiency: percent.round() as u64,
                status: EfficiencyStatus::from_percent(percent),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub total_production: u64,
    /// Percent of the overall target, 2 decimals.
    pub efficiency_rate: f64,
    pub active_workers: usize,
}

pub fn production_summary(records: &[ProductionRecord], targets: &LineTargets) -> ProductionSummary {
    let snapshot = compute_snapshot(records, targets);
    ProductionSummary {
        total_production: snapshot.overall_produced,
        efficiency_rate: round2(snapshot.percent_complete),
        active_workers: records.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadingLine {
    pub line: LineNumber,
    pub total: u64,
    /// Highest producers on the line, most pieces first.
    pub top: Vec<ProductionRecord>,
}

/// The line with the most pieces and its `top_n` best records.
///
/// Ties go to the lowest line number. Unassigned records never lead. Returns
/// `None` when no line has produced anything.
pub fn leading_line(records: &[ProductionRecord], top_n: usize) -> Option<LeadingLine> {
    let mut totals: BTreeMap<LineNumber, u64> = BTreeMap::new();
    for record in records {
        if let Some(line) = record.line {
            let total = totals.entry(line).or_insert(0);
            *total = total.saturating_add(record.pcs);
        }
    }

    let (line, total) = totals
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .fold(None::<(LineNumber, u64)>, |best, (line, total)| match best {
            Some((_, best_total)) if best_total >= total => best,
            _ => Some((line, total)),
        })?;

    let mut top: Vec<ProductionRecord> = records
        .iter()
        .filter(|r| r.line == Some(line))
        .cloned()
        .collect();
    top.sort_by(|a, b| b.pcs.cmp(&a.pcs));
    top.truncate(top_n);

    Some(LeadingLine { line, total, top })
}
