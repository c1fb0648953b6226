use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical production line number. Lines are small positive integers.
pub type LineNumber = u32;

/// One tracked unit of work: an employee's running piece count or a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub id: String,
    /// `None` when the record is not assigned to any line.
    pub line: Option<LineNumber>,
    pub pcs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProductionRecord {
    pub fn new(id: impl Into<String>, line: Option<LineNumber>, pcs: u64) -> Self {
        Self {
            id: id.into(),
            line,
            pcs,
            name: None,
            timestamp: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTarget {
    pub line: LineNumber,
    pub target: u64,
}

/// Shift target table: line number → target quantity.
///
/// Built once from configuration and shared read-only for the lifetime of the
/// process. Iteration is always in ascending line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineTargets {
    lines: BTreeMap<LineNumber, u64>,
}

impl LineTargets {
    pub fn new(targets: impl IntoIterator<Item = LineTarget>) -> Self {
        let lines = targets.into_iter().map(|t| (t.line, t.target)).collect();
        Self { lines }
    }

    /// Every line in `lines` gets the same target.
    pub fn uniform(lines: impl IntoIterator<Item = LineNumber>, target: u64) -> Self {
        Self::new(lines.into_iter().map(|line| LineTarget { line, target }))
    }

    pub fn get(&self, line: LineNumber) -> Option<u64> {
        self.lines.get(&line).copied()
    }

    pub fn contains(&self, line: LineNumber) -> bool {
        self.lines.contains_key(&line)
    }

    pub fn total(&self) -> u64 {
        self.lines.values().fold(0u64, |acc, t| acc.saturating_add(*t))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = LineTarget> + '_ {
        self.lines
            .iter()
            .map(|(line, target)| LineTarget { line: *line, target: *target })
    }
}

impl FromIterator<(LineNumber, u64)> for LineTargets {
    fn from_iter<I: IntoIterator<Item = (LineNumber, u64)>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

/// One defect found on an inspected unit, as section/type/subtype codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectEntry {
    pub section: u16,
    #[serde(rename = "type")]
    pub defect_type: u16,
    pub subtype: u16,
}

/// One inspected unit with zero or more defects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_uid: Option<String>,
    #[serde(rename = "Defects", default)]
    pub defects: Vec<DefectEntry>,
    /// Inspection time, when the producer sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DefectRecord {
    pub fn is_defective(&self) -> bool {
        !self.defects.is_empty()
    }
}
