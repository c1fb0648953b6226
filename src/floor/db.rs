use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use lineboard_common::{DefectEntry, LineNumber};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;

/// Async-safe handle to the floor database.
///
/// Wraps `FloorDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<FloorDb>>,
}

impl DbHandle {
    pub fn new(db: FloorDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&FloorDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, FloorDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct FloorDb {
    conn: Connection,
}

const EMPLOYEE_COLUMNS: &str = "id, employee_id, name, line, pcs, created_at, updated_at";
const PLAN_COLUMNS: &str =
    "id, product, total_stock, finished_units, start_date, end_date, created_at, updated_at";

fn line_from_sql(value: Option<i64>) -> Option<LineNumber> {
    value.and_then(|v| LineNumber::try_from(v).ok())
}

fn count_from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn count_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        name: row.get(2)?,
        line: line_from_sql(row.get(3)?),
        pcs: count_from_sql(row.get(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Raw plan row; dates are parsed after the query so a bad value is an
/// `anyhow` error with context instead of a rusqlite conversion error.
struct PlanRow {
    id: i64,
    product: String,
    total_stock: i64,
    finished_units: i64,
    start_date: String,
    end_date: String,
    created_at: String,
    updated_at: String,
}

impl PlanRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            product: row.get(1)?,
            total_stock: row.get(2)?,
            finished_units: row.get(3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_plan(self) -> Result<ProductionPlan> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}' in production plan {}", s, self.id))
        };
        Ok(ProductionPlan {
            id: self.id,
            start_date: parse(&self.start_date)?,
            end_date: parse(&self.end_date)?,
            product: self.product,
            total_stock: count_from_sql(self.total_stock),
            finished_units: count_from_sql(self.finished_units),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl FloorDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS employees (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    employee_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    line INTEGER,
                    pcs INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS reallocations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
                    from_line INTEGER,
                    to_line INTEGER,
                    reason TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS scans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tag_uid TEXT NOT NULL,
                    line INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS garment_defects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tag_uid TEXT,
                    defects TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS production_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    product TEXT NOT NULL UNIQUE,
                    total_stock INTEGER NOT NULL,
                    finished_units INTEGER NOT NULL DEFAULT 0,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_employees_line ON employees(line);
                CREATE INDEX IF NOT EXISTS idx_reallocations_employee ON reallocations(employee_id);
                CREATE INDEX IF NOT EXISTS idx_scans_line ON scans(line);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Employees ─────────────────────────────────────────────────────

    pub fn create_employee(&self, req: &CreateEmployeeRequest) -> Result<Employee> {
        self.conn
            .execute(
                "INSERT INTO employees (employee_id, name, line, pcs) VALUES (?1, ?2, ?3, ?4)",
                params![req.employee_id, req.name, req.line, count_to_sql(req.pcs)],
            )
            .with_context(|| format!("Failed to insert employee {}", req.employee_id))?;
        let id = self.conn.last_insert_rowid();
        self.get_employee(id)?.context("Employee not found after insert")
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM employees ORDER BY id", EMPLOYEE_COLUMNS))
            .context("Failed to prepare list_employees")?;
        let rows = stmt
            .query_map([], employee_from_row)
            .context("Failed to query employees")?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row.context("Failed to read employee row")?);
        }
        Ok(employees)
    }

    pub fn get_employee(&self, id: i64) -> Result<Option<Employee>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM employees WHERE id = ?1", EMPLOYEE_COLUMNS),
                params![id],
                employee_from_row,
            )
            .optional()
            .context("Failed to query employee")
    }

    /// Returns `None` if the employee doesn't exist.
    pub fn update_pcs(&self, id: i64, pcs: u64) -> Result<Option<Employee>> {
        let changed = self
            .conn
            .execute(
                "UPDATE employees SET pcs = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![count_to_sql(pcs), id],
            )
            .context("Failed to update pcs")?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_employee(id)
    }

    /// Move an employee to `line` and record the move. Moving to the same
    /// line is a no-op and records nothing.
    pub fn reallocate(
        &self,
        id: i64,
        line: Option<LineNumber>,
        reason: Option<&str>,
    ) -> Result<Option<(Employee, Option<Reallocation>)>> {
        let Some(current) = self.get_employee(id)? else {
            return Ok(None);
        };
        if current.line == line {
            return Ok(Some((current, None)));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin reallocation")?;
        tx.execute(
            "UPDATE employees SET line = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![line, id],
        )
        .context("Failed to update employee line")?;
        tx.execute(
            "INSERT INTO reallocations (employee_id, from_line, to_line, reason) VALUES (?1, ?2, ?3, ?4)",
            params![id, current.line, line, reason],
        )
        .context("Failed to record reallocation")?;
        let realloc_id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit reallocation")?;

        let employee = self
            .get_employee(id)?
            .context("Employee not found after reallocation")?;
        let reallocation = self
            .get_reallocation(realloc_id)?
            .context("Reallocation not found after insert")?;
        Ok(Some((employee, Some(reallocation))))
    }

    pub fn delete_employee(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM employees WHERE id = ?1", params![id])
            .context("Failed to delete employee")?;
        Ok(changed > 0)
    }

    // ── Reallocations ─────────────────────────────────────────────────

    fn get_reallocation(&self, id: i64) -> Result<Option<Reallocation>> {
        self.conn
            .query_row(
                "SELECT id, employee_id, from_line, to_line, reason, created_at FROM reallocations WHERE id = ?1",
                params![id],
                reallocation_from_row,
            )
            .optional()
            .context("Failed to query reallocation")
    }

    /// Newest first.
    pub fn list_reallocations(&self) -> Result<Vec<Reallocation>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, employee_id, from_line, to_line, reason, created_at
                 FROM reallocations ORDER BY id DESC",
            )
            .context("Failed to prepare list_reallocations")?;
        let rows = stmt
            .query_map([], reallocation_from_row)
            .context("Failed to query reallocations")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read reallocation row")?);
        }
        Ok(out)
    }

    /// Employees on a line other than their original one, most recently
    /// moved first. Unassigned employees and those moved back home are left out.
    pub fn list_reallocated_employees(&self) -> Result<Vec<ReallocatedEmployee>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT e.id, e.employee_id, e.name,
                        (SELECT first.from_line FROM reallocations first
                         WHERE first.employee_id = e.id ORDER BY first.id LIMIT 1),
                        e.line, COUNT(r.id), MAX(r.created_at)
                 FROM employees e JOIN reallocations r ON r.employee_id = e.id
                 WHERE e.line IS NOT NULL
                 GROUP BY e.id
                 ORDER BY MAX(r.id) DESC",
            )
            .context("Failed to prepare list_reallocated_employees")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ReallocatedEmployee {
                    id: row.get(0)?,
                    employee_id: row.get(1)?,
                    name: row.get(2)?,
                    original_line: line_from_sql(row.get(3)?),
                    line: line_from_sql(row.get(4)?).unwrap_or_default(),
                    moves: count_from_sql(row.get(5)?),
                    last_moved_at: row.get(6)?,
                })
            })
            .context("Failed to query reallocated employees")?;
        let mut out = Vec::new();
        for row in rows {
            let employee = row.context("Failed to read reallocated employee row")?;
            if employee.original_line != Some(employee.line) {
                out.push(employee);
            }
        }
        Ok(out)
    }

    // ── Scans ─────────────────────────────────────────────────────────

    pub fn record_scan(&self, tag_uid: &str, line: Option<LineNumber>) -> Result<Scan> {
        self.conn
            .execute(
                "INSERT INTO scans (tag_uid, line) VALUES (?1, ?2)",
                params![tag_uid, line],
            )
            .context("Failed to insert scan")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, tag_uid, line, created_at FROM scans WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Scan {
                        id: row.get(0)?,
                        tag_uid: row.get(1)?,
                        line: line_from_sql(row.get(2)?),
                        created_at: row.get(3)?,
                    })
                },
            )
            .context("Scan not found after insert")
    }

    pub fn scan_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))
            .context("Failed to count scans")?;
        Ok(count_from_sql(count))
    }

    // ── Defects ───────────────────────────────────────────────────────

    pub fn record_defect(&self, tag_uid: Option<&str>, defects: &[DefectEntry]) -> Result<GarmentDefect> {
        let json = serde_json::to_string(defects).context("Failed to serialize defects")?;
        self.conn
            .execute(
                "INSERT INTO garment_defects (tag_uid, defects) VALUES (?1, ?2)",
                params![tag_uid, json],
            )
            .context("Failed to insert defect")?;
        let id = self.conn.last_insert_rowid();
        self.list_defects_where(Some(id))?
            .pop()
            .context("Defect not found after insert")
    }

    pub fn list_defects(&self) -> Result<Vec<GarmentDefect>> {
        self.list_defects_where(None)
    }

    fn list_defects_where(&self, id: Option<i64>) -> Result<Vec<GarmentDefect>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, tag_uid, defects, created_at FROM garment_defects
                 WHERE ?1 IS NULL OR id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_defects")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("Failed to query defects")?;
        let mut out = Vec::new();
        for row in rows {
            let (id, tag_uid, defects, created_at) = row.context("Failed to read defect row")?;
            let defects: Vec<DefectEntry> = serde_json::from_str(&defects)
                .with_context(|| format!("Invalid defect list for inspection {}", id))?;
            out.push(GarmentDefect {
                id,
                tag_uid,
                defects,
                created_at,
            });
        }
        Ok(out)
    }

    // ── Production plans ──────────────────────────────────────────────

    pub fn create_plan(&self, req: &CreatePlanRequest) -> Result<ProductionPlan> {
        self.conn
            .execute(
                "INSERT INTO production_plans (product, total_stock, finished_units, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    req.product,
                    count_to_sql(req.total_stock),
                    count_to_sql(req.finished_units),
                    req.start_date.format("%Y-%m-%d").to_string(),
                    req.end_date.format("%Y-%m-%d").to_string(),
                ],
            )
            .with_context(|| format!("Failed to insert production plan '{}'", req.product))?;
        let id = self.conn.last_insert_rowid();
        self.get_plan(id)?.context("Production plan not found after insert")
    }

    pub fn get_plan(&self, id: i64) -> Result<Option<ProductionPlan>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM production_plans WHERE id = ?1", PLAN_COLUMNS),
                params![id],
                PlanRow::from_row,
            )
            .optional()
            .context("Failed to query production plan")?;
        row.map(PlanRow::into_plan).transpose()
    }

    pub fn list_plans(&self) -> Result<Vec<ProductionPlan>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM production_plans ORDER BY id", PLAN_COLUMNS))
            .context("Failed to prepare list_plans")?;
        let rows = stmt
            .query_map([], PlanRow::from_row)
            .context("Failed to query production plans")?;
        let mut plans = Vec::new();
        for row in rows {
            plans.push(row.context("Failed to read production plan row")?.into_plan()?);
        }
        Ok(plans)
    }

    pub fn update_plan(&self, id: i64, req: &UpdatePlanRequest) -> Result<Option<ProductionPlan>> {
        let Some(current) = self.get_plan(id)? else {
            return Ok(None);
        };
        let total_stock = req.total_stock.unwrap_or(current.total_stock);
        let finished_units = req.finished_units.unwrap_or(current.finished_units);
        let end_date = req.end_date.unwrap_or(current.end_date);
        self.conn
            .execute(
                "UPDATE production_plans
                 SET total_stock = ?1, finished_units = ?2, end_date = ?3, updated_at = datetime('now')
                 WHERE id = ?4",
                params![
                    count_to_sql(total_stock),
                    count_to_sql(finished_units),
                    end_date.format("%Y-%m-%d").to_string(),
                    id,
                ],
            )
            .context("Failed to update production plan")?;
        self.get_plan(id)
    }
}

fn reallocation_from_row(row: &Row<'_>) -> rusqlite::Result<Reallocation> {
    Ok(Reallocation {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        from_line: line_from_sql(row.get(2)?),
        to_line: line_from_sql(row.get(3)?),
        reason: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_employee(employee_id: &str, line: Option<LineNumber>, pcs: u64) -> CreateEmployeeRequest {
        CreateEmployeeRequest {
            employee_id: employee_id.to_string(),
            name: format!("Worker {}", employee_id),
            line,
            pcs,
        }
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = FloorDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('employees', 'reallocations', 'scans', 'garment_defects', 'production_plans')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 5, "Expected 5 tables to exist");

        // Re-running migrations is harmless.
        db.run_migrations()?;
        Ok(())
    }

    #[test]
    fn test_new_creates_parent_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("lineboard.db");
        let db = FloorDb::new(&path)?;
        db.create_employee(&new_employee("E1", Some(1), 0))?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_employee_crud() -> Result<()> {
        let db = FloorDb::new_in_memory()?;

        let created = db.create_employee(&new_employee("E1", Some(2), 10))?;
        assert!(created.id > 0);
        assert_eq!(created.line, Some(2));
        assert_eq!(created.pcs, 10);
        assert!(!created.updated_at.is_empty());

        let updated = db.update_pcs(created.id, 25)?.expect("employee should exist");
        assert_eq!(updated.pcs, 25);

        db.create_employee(&new_employee("E2", None, 0))?;
        let all = db.list_employees()?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].line, None);

        assert!(db.delete_employee(created.id)?);
        assert!(!db.delete_employee(created.id)?);
        assert!(db.get_employee(created.id)?.is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_employee_id_is_rejected() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        db.create_employee(&new_employee("E1", Some(1), 0))?;
        assert!(db.create_employee(&new_employee("E1", Some(2), 0)).is_err());
        Ok(())
    }

    #[test]
    fn test_update_missing_employee_returns_none() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        assert!(db.update_pcs(99, 1)?.is_none());
        assert!(db.reallocate(99, Some(1), None)?.is_none());
        Ok(())
    }

    #[test]
    fn test_reallocate_records_history() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        let e = db.create_employee(&new_employee("E1", Some(1), 5))?;

        let (moved, record) = db.reallocate(e.id, Some(4), Some("line 4 short"))?.unwrap();
        assert_eq!(moved.line, Some(4));
        let record = record.expect("a move is recorded");
        assert_eq!(record.from_line, Some(1));
        assert_eq!(record.to_line, Some(4));
        assert_eq!(record.reason.as_deref(), Some("line 4 short"));

        let (same, none) = db.reallocate(e.id, Some(4), None)?.unwrap();
        assert_eq!(same.line, Some(4));
        assert!(none.is_none());

        db.reallocate(e.id, None, None)?;
        let history = db.list_reallocations()?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_line, None);
        Ok(())
    }

    #[test]
    fn test_reallocated_employees_track_original_line() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        let moved = db.create_employee(&new_employee("E1", Some(1), 0))?;
        let home = db.create_employee(&new_employee("E2", Some(3), 0))?;
        let parked = db.create_employee(&new_employee("E3", Some(2), 0))?;
        db.create_employee(&new_employee("E4", Some(2), 0))?;

        db.reallocate(moved.id, Some(4), None)?;
        db.reallocate(moved.id, Some(5), Some("cover"))?;
        db.reallocate(home.id, Some(6), None)?;
        db.reallocate(home.id, Some(3), None)?;
        db.reallocate(parked.id, None, None)?;

        let list = db.list_reallocated_employees()?;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].employee_id, "E1");
        assert_eq!(list[0].original_line, Some(1));
        assert_eq!(list[0].line, 5);
        assert_eq!(list[0].moves, 2);
        assert!(!list[0].last_moved_at.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_employee_cascades_reallocations() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        let e = db.create_employee(&new_employee("E1", Some(1), 0))?;
        db.reallocate(e.id, Some(2), None)?;
        db.delete_employee(e.id)?;
        assert!(db.list_reallocations()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_scans() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        assert_eq!(db.scan_count()?, 0);
        let scan = db.record_scan("TAG-1", Some(3))?;
        assert_eq!(scan.tag_uid, "TAG-1");
        assert_eq!(scan.line, Some(3));
        db.record_scan("TAG-2", None)?;
        assert_eq!(db.scan_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_defects_roundtrip_through_json_column() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        let entry = DefectEntry {
            section: 2,
            defect_type: 5,
            subtype: 1,
        };
        let recorded = db.record_defect(Some("TAG-9"), &[entry])?;
        assert_eq!(recorded.defects, vec![entry]);
        db.record_defect(None, &[])?;

        let all = db.list_defects()?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tag_uid.as_deref(), Some("TAG-9"));
        assert!(all[1].defects.is_empty());
        Ok(())
    }

    #[test]
    fn test_production_plan_crud() -> Result<()> {
        let db = FloorDb::new_in_memory()?;
        let plan = db.create_plan(&CreatePlanRequest {
            product: "Polo".to_string(),
            total_stock: 1000,
            finished_units: 0,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        })?;
        assert_eq!(plan.total_stock, 1000);
        assert_eq!(plan.end_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());

        let updated = db
            .update_plan(
                plan.id,
                &UpdatePlanRequest {
                    finished_units: Some(400),
                    ..Default::default()
                },
            )?
            .unwrap();
        assert_eq!(updated.finished_units, 400);
        assert_eq!(updated.total_stock, 1000);

        assert_eq!(db.list_plans()?.len(), 1);
        assert!(db.update_plan(99, &UpdatePlanRequest::default())?.is_none());
        Ok(())
    }
}
