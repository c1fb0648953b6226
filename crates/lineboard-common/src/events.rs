//! Notification topics shared by the floor server and dashboard clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Independent notification channels. No ordering holds between topics.
///
/// The serialized names are the event names dashboards already listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "leadingLineUpdate")]
    ProductionChanged,
    #[serde(rename = "defectUpdate")]
    DefectRecorded,
    #[serde(rename = "reallocationUpdate")]
    ReallocationChanged,
    #[serde(rename = "scanUpdate")]
    ScanRecorded,
    #[serde(rename = "productionPlanUpdate")]
    PlanChanged,
    /// The set of employees working away from their original line.
    #[serde(rename = "reallocatedEmployeesUpdate")]
    ReallocatedEmployeesChanged,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::ProductionChanged,
        Topic::DefectRecorded,
        Topic::ReallocationChanged,
        Topic::ScanRecorded,
        Topic::PlanChanged,
        Topic::ReallocatedEmployeesChanged,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::ProductionChanged => "leadingLineUpdate",
            Self::DefectRecorded => "defectUpdate",
            Self::ReallocationChanged => "reallocationUpdate",
            Self::ScanRecorded => "scanUpdate",
            Self::PlanChanged => "productionPlanUpdate",
            Self::ReallocatedEmployeesChanged => "reallocatedEmployeesUpdate",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.wire_name() == s)
            .ok_or_else(|| format!("Unknown topic: {}", s))
    }
}

/// A published event. `data` is either the refreshed collection or `None`,
/// in which case consumers pull a fresh copy themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub topic: Topic,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(topic: Topic, data: Option<serde_json::Value>) -> Self {
        Self { topic, data }
    }
}
