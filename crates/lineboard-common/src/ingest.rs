//! Normalisation of loosely-shaped JSON records.
//!
//! Producers disagree on field names (`pcs` / `PCS`, `line` / `Line_Number`
//! / `lineNo`) and on value types (numbers, numeric strings, `"Line 03"`).
//! This module folds all of them into [`ProductionRecord`] and
//! [`DefectRecord`] so aggregation never has to branch on spelling.
//! Unusable values degrade to 0 / unassigned and are reported, never fatal.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::MalformedRecordError;
use crate::record::{DefectEntry, DefectRecord, LineNumber, ProductionRecord};

const ID_KEYS: &[&str] = &["id", "_id", "ID"];
const LINE_KEYS: &[&str] = &["line", "Line_Number", "lineNo", "line_number"];
const PCS_KEYS: &[&str] = &["pcs", "PCS"];
const NAME_KEYS: &[&str] = &["name", "Name"];
const TIME_KEYS: &[&str] = &["updated_at", "updatedAt", "timestamp", "Time_Stamp", "created_at"];
const DEFECTS_KEYS: &[&str] = &["Defects", "defects"];
const TAG_KEYS: &[&str] = &["tag_uid", "Tag_UID"];

/// Normalised output plus every problem found on the way.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub issues: Vec<MalformedRecordError>,
}

// Derived Default would demand `T: Default`, which records don't implement.
impl<T> Default for Ingested<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn id_of(obj: &Map<String, Value>, index: usize) -> String {
    match field(obj, ID_KEYS) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        // Mongo-style {"$oid": "..."}
        Some(Value::Object(o)) => o
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index)),
        _ => format!("#{}", index),
    }
}

/// Non-negative integer from a number or numeric string. Fractions truncate.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Line number from `3`, `"3"`, `"Line 03"` or `["Line 03"]`. Line 0 is not a line.
///
/// Anything after the number (`"Line 2 (Team 1)"`) makes the value invalid
/// rather than being folded into the digits.
fn as_line(value: &Value) -> Option<LineNumber> {
    let line = match value {
        Value::Number(n) => n.as_u64().and_then(|n| LineNumber::try_from(n).ok()),
        Value::String(s) => parse_line_label(s),
        Value::Array(items) => items.first().and_then(as_line),
        _ => None,
    }?;
    (line > 0).then_some(line)
}

fn parse_line_label(label: &str) -> Option<LineNumber> {
    let label = label.trim();
    let digits = match label.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("line") => label[4..].trim_start(),
        _ => label,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        // Epoch milliseconds as sent by the scanners.
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub fn production_record(
    value: &Value,
    index: usize,
    issues: &mut Vec<MalformedRecordError>,
) -> Option<ProductionRecord> {
    let Some(obj) = value.as_object() else {
        issues.push(MalformedRecordError::NotAnObject { index });
        return None;
    };
    let id = id_of(obj, index);

    let pcs = match field(obj, PCS_KEYS) {
        None => {
            issues.push(MalformedRecordError::MissingField {
                id: id.clone(),
                field: "pcs",
            });
            0
        }
        Some(raw) => as_count(raw).unwrap_or_else(|| {
            issues.push(MalformedRecordError::InvalidField {
                id: id.clone(),
                field: "pcs",
                value: raw.to_string(),
            });
            0
        }),
    };

    let line = field(obj, LINE_KEYS).and_then(|raw| {
        let line = as_line(raw);
        if line.is_none() {
            issues.push(MalformedRecordError::InvalidField {
                id: id.clone(),
                field: "line",
                value: raw.to_string(),
            });
        }
        line
    });

    Some(ProductionRecord {
        id,
        line,
        pcs,
        name: field(obj, NAME_KEYS).and_then(Value::as_str).map(str::to_string),
        timestamp: field(obj, TIME_KEYS).and_then(as_timestamp),
    })
}

/// Normalise a full collection fetch. A non-array body yields no records.
pub fn production_records(body: &Value) -> Ingested<ProductionRecord> {
    let mut out = Ingested::default();
    let Some(items) = body.as_array() else {
        out.issues.push(MalformedRecordError::NotAnObject { index: 0 });
        return out;
    };
    for (index, item) in items.iter().enumerate() {
        if let Some(record) = production_record(item, index, &mut out.issues) {
            out.records.push(record);
        }
    }
    out
}

fn defect_entry(value: &Value, id: &str, issues: &mut Vec<MalformedRecordError>) -> DefectEntry {
    let mut code = |keys: &[&str], name: &'static str| -> u16 {
        let obj = value.as_object();
        match obj.and_then(|o| field(o, keys)).and_then(as_count) {
            Some(n) => u16::try_from(n).unwrap_or(u16::MAX),
            None => {
                issues.push(MalformedRecordError::MissingField {
                    id: id.to_string(),
                    field: name,
                });
                0
            }
        }
    };
    DefectEntry {
        section: code(&["section", "Section"], "section"),
        defect_type: code(&["type", "Type", "defect_type"], "type"),
        subtype: code(&["subtype", "Subtype"], "subtype"),
    }
}

pub fn defect_records(body: &Value) -> Ingested<DefectRecord> {
    let mut out = Ingested::default();
    let Some(items) = body.as_array() else {
        out.issues.push(MalformedRecordError::NotAnObject { index: 0 });
        return out;
    };
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            out.issues.push(MalformedRecordError::NotAnObject { index });
            continue;
        };
        let id = id_of(obj, index);
        let defects = match field(obj, DEFECTS_KEYS) {
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|e| defect_entry(e, &id, &mut out.issues))
                .collect(),
            _ => Vec::new(),
        };
        out.records.push(DefectRecord {
            tag_uid: field(obj, TAG_KEYS).and_then(Value::as_str).map(str::to_string),
            id,
            defects,
            timestamp: field(obj, TIME_KEYS).and_then(as_timestamp),
        });
    }
    out
}

/// `{ "count": n }` from the scan-count endpoint. Missing or bad counts are 0.
pub fn scan_count(body: &Value) -> u64 {
    body.get("count").and_then(as_count).unwrap_or(0)
}
