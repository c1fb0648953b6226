use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lineboard_common::plan::{PlanTargets, plan_targets};
use lineboard_common::report::PlanProgress;
use lineboard_common::{DefectEntry, DefectRecord, LineNumber, ProductionRecord};
use serde::{Deserialize, Serialize};

/// A sewing-floor employee and the pieces they have produced this shift.
///
/// Serialises in the shape `ingest::production_records` reads back, so
/// `GET /api/employees` is directly a production-record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    /// `None` while unassigned.
    pub line: Option<LineNumber>,
    pub pcs: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite `datetime('now')` text, which is UTC.
fn sqlite_time(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl Employee {
    pub fn to_record(&self) -> ProductionRecord {
        ProductionRecord {
            id: self.id.to_string(),
            line: self.line,
            pcs: self.pcs,
            name: Some(self.name.clone()),
            timestamp: sqlite_time(&self.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reallocation {
    pub id: i64,
    pub employee_id: i64,
    pub from_line: Option<LineNumber>,
    pub to_line: Option<LineNumber>,
    pub reason: Option<String>,
    pub created_at: String,
}

/// An employee currently working away from the line they started on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReallocatedEmployee {
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    /// Line before the first recorded move. `None` if they started unassigned.
    pub original_line: Option<LineNumber>,
    pub line: LineNumber,
    pub moves: u64,
    pub last_moved_at: String,
}

/// One RFID tag read at a line station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: i64,
    pub tag_uid: String,
    pub line: Option<LineNumber>,
    pub created_at: String,
}

/// A garment inspection. An empty `defects` list is a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentDefect {
    pub id: i64,
    pub tag_uid: Option<String>,
    #[serde(rename = "Defects")]
    pub defects: Vec<DefectEntry>,
    pub created_at: String,
}

impl GarmentDefect {
    pub fn to_record(&self) -> DefectRecord {
        DefectRecord {
            id: self.id.to_string(),
            tag_uid: self.tag_uid.clone(),
            defects: self.defects.clone(),
            timestamp: sqlite_time(&self.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub id: i64,
    pub product: String,
    pub total_stock: u64,
    pub finished_units: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: String,
    pub updated_at: String,
}

/// A plan together with the targets derived from it as of a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: ProductionPlan,
    #[serde(flatten)]
    pub targets: PlanTargets,
}

impl ProductionPlan {
    pub fn progress(&self) -> PlanProgress {
        PlanProgress {
            product: self.product.clone(),
            total_stock: self.total_stock,
            finished_units: self.finished_units,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    pub fn view(self, today: NaiveDate) -> PlanView {
        let targets = plan_targets(self.total_stock, self.finished_units, self.end_date, today);
        PlanView {
            plan: self,
            targets,
        }
    }
}

// ── Request payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeRequest {
    pub employee_id: String,
    pub name: String,
    pub line: Option<LineNumber>,
    #[serde(default)]
    pub pcs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePcsRequest {
    pub pcs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReallocateRequest {
    /// `None` unassigns the employee.
    pub line: Option<LineNumber>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordScanRequest {
    pub tag_uid: String,
    pub line: Option<LineNumber>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordDefectRequest {
    pub tag_uid: Option<String>,
    #[serde(default, alias = "Defects")]
    pub defects: Vec<DefectEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanRequest {
    pub product: String,
    pub total_stock: u64,
    #[serde(default)]
    pub finished_units: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanRequest {
    pub total_stock: Option<u64>,
    pub finished_units: Option<u64>,
    pub end_date: Option<NaiveDate>,
}
