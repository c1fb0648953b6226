use serde::{Deserialize, Serialize};

/// Efficiency band for a line or report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficiencyStatus {
    Excellent,
    Good,
    Average,
    Poor,
}

impl EfficiencyStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 95.0 {
            Self::Excellent
        } else if percent >= 85.0 {
            Self::Good
        } else if percent >= 70.0 {
            Self::Average
        } else {
            Self::Poor
        }
    }
}

/// Quality band for a defect rate. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectStatus {
    Excellent,
    Good,
    Poor,
}

impl DefectStatus {
    pub fn from_rate(rate: f64) -> Self {
        if rate <= 1.0 {
            Self::Excellent
        } else if rate <= 3.0 {
            Self::Good
        } else {
            Self::Poor
        }
    }
}
