//! Shared domain types for lineboard.
//!
//! Everything in this crate is synchronous and free of I/O: the record
//! shapes produced by the floor, the normalisation that turns loosely-typed
//! JSON into those shapes, and the pure aggregation that dashboards run over
//! a fetched snapshot.

pub mod aggregate;
pub mod error;
pub mod events;
pub mod grade;
pub mod ingest;
pub mod plan;
pub mod record;
pub mod report;

pub use aggregate::{
    AggregateSnapshot, DefectSummary, LeadingLine, LinePerformance, ProductionSummary,
    compute_defect_rate, compute_defect_summary, compute_snapshot, defect_rate, leading_line,
    line_performance, production_summary,
};
pub use error::MalformedRecordError;
pub use events::{Notification, Topic};
pub use grade::{DefectStatus, EfficiencyStatus};
pub use report::{ReportKind, ReportPeriod, ReportRow, ReportWindow};
pub use record::{DefectEntry, DefectRecord, LineNumber, LineTarget, LineTargets, ProductionRecord};
