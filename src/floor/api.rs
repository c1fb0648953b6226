use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, put},
};
use lineboard_common::report::{
    PlanProgress, defect_rate_report, line_efficiency_report, target_achievement_report,
};
use lineboard_common::{
    AggregateSnapshot, DefectRecord, LineTargets, Notification, ProductionRecord, ReportKind,
    ReportPeriod, ReportRow, ReportWindow, Topic, compute_defect_summary, compute_snapshot,
    leading_line, line_performance, production_summary,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::db::{DbHandle, FloorDb};
use super::models::*;
use super::sse::events_sse;
use super::ws::{forward_to_broadcast, ws_handler};
use crate::errors::ServerError;
use crate::notifier::{Notifier, Subscription};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub notifier: Notifier,
    /// Fan-out to `/ws` and `/api/events`, fed from `notifier`.
    pub events_tx: broadcast::Sender<Notification>,
    pub targets: Arc<LineTargets>,
    pub top_performers: usize,
    _forwarder: Vec<Subscription>,
}

impl AppState {
    pub fn new(
        db: DbHandle,
        notifier: Notifier,
        targets: Arc<LineTargets>,
        broadcast_capacity: usize,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(broadcast_capacity.max(1));
        let forwarder = forward_to_broadcast(&notifier, events_tx.clone());
        Self {
            db,
            notifier,
            events_tx,
            targets,
            top_performers: 5,
            _forwarder: forwarder,
        }
    }

    pub fn with_top_performers(mut self, top: usize) -> Self {
        self.top_performers = top;
        self
    }
}

pub type SharedState = Arc<AppState>;

// ── Query types ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    /// Presentation cap for `percent_display`. Omitted means uncapped.
    pub cap: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadingLineQuery {
    pub top: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    #[serde(flatten)]
    pub snapshot: AggregateSnapshot,
    pub percent_display: f64,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: ReportKind,
    pub period: ReportPeriod,
    pub window: ReportWindow,
    pub data: Vec<ReportRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanCount {
    pub count: u64,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::EmployeeNotFound { .. } | ServerError::PlanNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            ServerError::BadRequest(msg) => ApiError::BadRequest(msg),
            ServerError::Database(e) if is_unique_violation(&e) => {
                ApiError::Conflict(format!("{:#}", e))
            }
            ServerError::Database(e) | ServerError::Other(e) => {
                tracing::error!(error = %format!("{:#}", e), "request failed");
                ApiError::Internal(format!("{:#}", e))
            }
        }
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("UNIQUE constraint failed"))
}

type ApiResult<T> = Result<T, ApiError>;

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/employees", get(list_employees).post(create_employee))
        .route("/api/employees/{id}", axum::routing::delete(delete_employee))
        .route("/api/employees/{id}/pcs", patch(update_pcs))
        .route("/api/employees/{id}/line", patch(reallocate_employee))
        .route("/api/reallocations", get(list_reallocations))
        .route("/api/reallocations/reallocated", get(list_reallocated_employees))
        .route("/api/scans", axum::routing::post(record_scan))
        .route("/api/scan-count", get(scan_count))
        .route("/api/defects", get(list_defects).post(record_defect))
        .route("/api/targets", get(get_targets))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/summary", get(get_summary))
        .route("/api/line-performance", get(get_line_performance))
        .route("/api/leading-line", get(get_leading_line))
        .route("/api/defect-rate", get(get_defect_rate))
        .route("/api/reports/{kind}/{period}", get(get_report))
        .route("/api/production-plans", get(list_plans).post(create_plan))
        .route("/api/production-plans/{id}", put(update_plan))
        .route("/api/events", get(events_sse))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

async fn with_db<F, R>(state: &SharedState, f: F) -> Result<R, ServerError>
where
    F: FnOnce(&FloorDb) -> anyhow::Result<R> + Send + 'static,
    R: Send + 'static,
{
    state.db.call(f).await.map_err(ServerError::Database)
}

async fn production_records(state: &SharedState) -> Result<Vec<ProductionRecord>, ServerError> {
    let employees = with_db(state, |db| db.list_employees()).await?;
    Ok(employees.iter().map(Employee::to_record).collect())
}

async fn defect_records(state: &SharedState) -> Result<Vec<DefectRecord>, ServerError> {
    let defects = with_db(state, |db| db.list_defects()).await?;
    Ok(defects.iter().map(GarmentDefect::to_record).collect())
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn publish<T: Serialize>(state: &SharedState, topic: Topic, payload: Option<&T>) {
    let payload = payload.and_then(|p| match serde_json::to_value(p) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "publishing without payload");
            None
        }
    });
    let report = state.notifier.publish(topic, payload);
    if !report.is_clean() {
        tracing::warn!(topic = %topic, failures = report.failures.len(), "notification partly delivered");
    }
}

/// Publish the refreshed employee collection after any production change.
async fn publish_production(state: &SharedState) -> Result<(), ServerError> {
    let employees = with_db(state, |db| db.list_employees()).await?;
    publish(state, Topic::ProductionChanged, Some(&employees));
    Ok(())
}

// ── Handlers: health ──────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

// ── Handlers: employees ───────────────────────────────────────────────

async fn list_employees(State(state): State<SharedState>) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(with_db(&state, |db| db.list_employees()).await?))
}

async fn create_employee(
    State(state): State<SharedState>,
    Json(req): Json<CreateEmployeeRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.employee_id.trim().is_empty() || req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("employee_id and name are required".into()).into());
    }
    if req.line == Some(0) {
        return Err(ServerError::BadRequest("line must be a positive number".into()).into());
    }
    let employee = with_db(&state, move |db| db.create_employee(&req)).await?;
    tracing::info!(employee = employee.id, line = ?employee.line, "employee created");
    publish_production(&state).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update_pcs(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePcsRequest>,
) -> ApiResult<Json<Employee>> {
    let employee = with_db(&state, move |db| db.update_pcs(id, req.pcs))
        .await?
        .ok_or(ServerError::EmployeeNotFound { id })?;
    publish_production(&state).await?;
    Ok(Json(employee))
}

async fn reallocate_employee(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<ReallocateRequest>,
) -> ApiResult<Json<Employee>> {
    if req.line == Some(0) {
        return Err(ServerError::BadRequest("line must be a positive number".into()).into());
    }
    let (employee, reallocation) = with_db(&state, move |db| {
        db.reallocate(id, req.line, req.reason.as_deref())
    })
    .await?
    .ok_or(ServerError::EmployeeNotFound { id })?;

    if let Some(reallocation) = reallocation {
        tracing::info!(
            employee = id,
            from = ?reallocation.from_line,
            to = ?reallocation.to_line,
            "employee reallocated"
        );
        publish(&state, Topic::ReallocationChanged, Some(&reallocation));
        let reallocated = with_db(&state, |db| db.list_reallocated_employees()).await?;
        publish(&state, Topic::ReallocatedEmployeesChanged, Some(&reallocated));
        publish_production(&state).await?;
    }
    Ok(Json(employee))
}

async fn delete_employee(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let deleted = with_db(&state, move |db| db.delete_employee(id)).await?;
    if !deleted {
        return Err(ServerError::EmployeeNotFound { id }.into());
    }
    publish_production(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reallocations(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<Reallocation>>> {
    Ok(Json(with_db(&state, |db| db.list_reallocations()).await?))
}

async fn list_reallocated_employees(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<ReallocatedEmployee>>> {
    Ok(Json(with_db(&state, |db| db.list_reallocated_employees()).await?))
}

// ── Handlers: scans & defects ─────────────────────────────────────────

async fn record_scan(
    State(state): State<SharedState>,
    Json(req): Json<RecordScanRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.tag_uid.trim().is_empty() {
        return Err(ServerError::BadRequest("tag_uid is required".into()).into());
    }
    let scan = with_db(&state, move |db| db.record_scan(req.tag_uid.trim(), req.line)).await?;
    // Scans are frequent; dashboards pull the count themselves.
    publish::<()>(&state, Topic::ScanRecorded, None);
    Ok((StatusCode::CREATED, Json(scan)))
}

async fn scan_count(State(state): State<SharedState>) -> ApiResult<Json<ScanCount>> {
    let count = with_db(&state, |db| db.scan_count()).await?;
    Ok(Json(ScanCount { count }))
}

async fn list_defects(State(state): State<SharedState>) -> ApiResult<Json<Vec<GarmentDefect>>> {
    Ok(Json(with_db(&state, |db| db.list_defects()).await?))
}

async fn record_defect(
    State(state): State<SharedState>,
    Json(req): Json<RecordDefectRequest>,
) -> ApiResult<impl IntoResponse> {
    let (defect, all) = with_db(&state, move |db| {
        let defect = db.record_defect(req.tag_uid.as_deref(), &req.defects)?;
        Ok((defect, db.list_defects()?))
    })
    .await?;
    tracing::info!(inspection = defect.id, entries = defect.defects.len(), "inspection recorded");
    publish(&state, Topic::DefectRecorded, Some(&all));
    Ok((StatusCode::CREATED, Json(defect)))
}

// ── Handlers: aggregates ──────────────────────────────────────────────

async fn get_targets(State(state): State<SharedState>) -> Json<LineTargets> {
    Json(state.targets.as_ref().clone())
}

async fn get_snapshot(
    State(state): State<SharedState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<SnapshotResponse>> {
    if let Some(cap) = query.cap
        && !(cap.is_finite() && cap > 0.0)
    {
        return Err(ApiError::BadRequest(format!(
            "cap must be a positive number, got {}",
            cap
        )));
    }
    let records = production_records(&state).await?;
    let snapshot = compute_snapshot(&records, &state.targets);
    let percent_display = snapshot.percent_capped(query.cap);
    Ok(Json(SnapshotResponse {
        snapshot,
        percent_display,
    }))
}

async fn get_summary(
    State(state): State<SharedState>,
) -> ApiResult<Json<lineboard_common::ProductionSummary>> {
    let records = production_records(&state).await?;
    Ok(Json(production_summary(&records, &state.targets)))
}

async fn get_line_performance(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<lineboard_common::LinePerformance>>> {
    let records = production_records(&state).await?;
    Ok(Json(line_performance(&records, &state.targets)))
}

async fn get_leading_line(
    State(state): State<SharedState>,
    Query(query): Query<LeadingLineQuery>,
) -> ApiResult<Json<Option<lineboard_common::LeadingLine>>> {
    let records = production_records(&state).await?;
    let top = query.top.unwrap_or(state.top_performers);
    Ok(Json(leading_line(&records, top)))
}

async fn get_defect_rate(
    State(state): State<SharedState>,
) -> ApiResult<Json<lineboard_common::DefectSummary>> {
    let defects = defect_records(&state).await?;
    let produced = with_db(&state, |db| db.scan_count()).await?;
    Ok(Json(compute_defect_summary(&defects, produced)))
}

// ── Handlers: period reports ──────────────────────────────────────────

/// An unknown report is a 404; an unknown period reads as `today`.
async fn get_report(
    State(state): State<SharedState>,
    Path((kind, period)): Path<(String, String)>,
) -> ApiResult<Json<ReportResponse>> {
    let kind: ReportKind = kind
        .parse()
        .map_err(|e: lineboard_common::report::UnknownReportKind| ApiError::NotFound(e.to_string()))?;
    let period = ReportPeriod::from_name(&period);
    let window = period.window(&chrono::Local::now());

    let data = match kind {
        ReportKind::LineEfficiency | ReportKind::EmployeeEfficiency => {
            let records = production_records(&state).await?;
            line_efficiency_report(&records, &state.targets, period, &window)
        }
        ReportKind::TargetAchievement => {
            let plans = with_db(&state, |db| db.list_plans()).await?;
            let progress: Vec<PlanProgress> = plans.iter().map(ProductionPlan::progress).collect();
            target_achievement_report(&progress, &window)
        }
        ReportKind::DefectRate => {
            let defects = defect_records(&state).await?;
            let records = production_records(&state).await?;
            defect_rate_report(&defects, &records, &window)
        }
    };
    tracing::debug!(report = ?kind, period = %period, rows = data.len(), "report built");

    Ok(Json(ReportResponse {
        report: kind,
        period,
        window,
        data,
    }))
}

// ── Handlers: production plans ────────────────────────────────────────

async fn plan_views(state: &SharedState) -> Result<Vec<PlanView>, ServerError> {
    let today = today();
    let plans = with_db(state, |db| db.list_plans()).await?;
    Ok(plans.into_iter().map(|p| p.view(today)).collect())
}

async fn list_plans(State(state): State<SharedState>) -> ApiResult<Json<Vec<PlanView>>> {
    Ok(Json(plan_views(&state).await?))
}

async fn create_plan(
    State(state): State<SharedState>,
    Json(req): Json<CreatePlanRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.product.trim().is_empty() {
        return Err(ServerError::BadRequest("product is required".into()).into());
    }
    if req.end_date < req.start_date {
        return Err(ServerError::BadRequest("end_date is before start_date".into()).into());
    }
    let plan = with_db(&state, move |db| db.create_plan(&req)).await?;
    publish(&state, Topic::PlanChanged, Some(&plan_views(&state).await?));
    Ok((StatusCode::CREATED, Json(plan.view(today()))))
}

async fn update_plan(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePlanRequest>,
) -> ApiResult<Json<PlanView>> {
    let plan = with_db(&state, move |db| db.update_plan(id, &req))
        .await?
        .ok_or(ServerError::PlanNotFound { id })?;
    publish(&state, Topic::PlanChanged, Some(&plan_views(&state).await?));
    Ok(Json(plan.view(today())))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state(targets: LineTargets) -> SharedState {
        let db = FloorDb::new_in_memory().unwrap();
        Arc::new(AppState::new(
            DbHandle::new(db),
            Notifier::new(),
            Arc::new(targets),
            16,
        ))
    }

    fn test_app() -> (Router, SharedState) {
        let state = test_state([(1, 10), (2, 80)].into_iter().collect());
        (api_router().with_state(state.clone()), state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn create(app: &Router, employee_id: &str, line: Option<u32>, pcs: u64) -> Value {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/employees",
                json!({"employee_id": employee_id, "name": employee_id, "line": line, "pcs": pcs}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response.into_body()).await
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = test_app();
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_employees_empty() {
        let (app, _) = test_app();
        let response = app.oneshot(get_request("/api/employees")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let employees: Vec<Value> = body_json(response.into_body()).await;
        assert!(employees.is_empty());
    }

    #[tokio::test]
    async fn test_create_employee_publishes_collection() {
        let (app, state) = test_app();
        let mut rx = state.events_tx.subscribe();

        let employee = create(&app, "E1", Some(1), 5).await;
        assert_eq!(employee["line"], 1);
        assert_eq!(employee["pcs"], 5);

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.topic, Topic::ProductionChanged);
        let data = notification.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_employee_validation() {
        let (app, _) = test_app();
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/employees", json!({"employee_id": "", "name": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        create(&app, "E1", Some(1), 0).await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/employees",
                json!({"employee_id": "E1", "name": "again"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_update_pcs_and_missing_employee() {
        let (app, _) = test_app();
        let employee = create(&app, "E1", Some(2), 0).await;
        let id = employee["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(json_request("PATCH", &format!("/api/employees/{}/pcs", id), json!({"pcs": 40})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Value = body_json(response.into_body()).await;
        assert_eq!(updated["pcs"], 40);

        let response = app
            .oneshot(json_request("PATCH", "/api/employees/999/pcs", json!({"pcs": 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reallocation_publishes_history_and_production() {
        let (app, state) = test_app();
        let employee = create(&app, "E1", Some(1), 3).await;
        let id = employee["id"].as_i64().unwrap();
        let mut rx = state.events_tx.subscribe();

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/api/employees/{}/line", id),
                json!({"line": 2, "reason": "balancing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(rx.recv().await.unwrap().topic, Topic::ReallocationChanged);
        let reallocated = rx.recv().await.unwrap();
        assert_eq!(reallocated.topic, Topic::ReallocatedEmployeesChanged);
        assert_eq!(reallocated.data.unwrap()[0]["original_line"], 1);
        assert_eq!(rx.recv().await.unwrap().topic, Topic::ProductionChanged);

        let response = app.oneshot(get_request("/api/reallocations")).await.unwrap();
        let history: Vec<Value> = body_json(response.into_body()).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["from_line"], 1);
        assert_eq!(history[0]["to_line"], 2);
    }

    #[tokio::test]
    async fn test_reallocated_employees_route() {
        let (app, _) = test_app();
        let id = create(&app, "E1", Some(1), 3).await["id"].as_i64().unwrap();
        create(&app, "E2", Some(2), 3).await;

        let response = app
            .clone()
            .oneshot(get_request("/api/reallocations/reallocated"))
            .await
            .unwrap();
        let empty: Vec<Value> = body_json(response.into_body()).await;
        assert!(empty.is_empty());

        let response = app
            .clone()
            .oneshot(json_request("PATCH", &format!("/api/employees/{}/line", id), json!({"line": 2})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get_request("/api/reallocations/reallocated"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list: Vec<Value> = body_json(response.into_body()).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["employee_id"], "E1");
        assert_eq!(list[0]["original_line"], 1);
        assert_eq!(list[0]["line"], 2);
        assert_eq!(list[0]["moves"], 1);
    }

    #[tokio::test]
    async fn test_delete_employee() {
        let (app, _) = test_app();
        let employee = create(&app, "E1", Some(1), 3).await;
        let uri = format!("/api/employees/{}", employee["id"]);

        let request = Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let request = Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_snapshot_over_target() {
        let (app, _) = test_app();
        create(&app, "E1", Some(1), 5).await;
        create(&app, "E2", Some(2), 80).await;
        create(&app, "E3", Some(3), 999).await;

        let response = app.oneshot(get_request("/api/snapshot?cap=100")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: Value = body_json(response.into_body()).await;
        assert_eq!(snapshot["per_line"]["1"], 5);
        assert_eq!(snapshot["per_line"]["2"], 80);
        assert_eq!(snapshot["untracked"], 999);
        assert_eq!(snapshot["overall_produced"], 1084);
        assert_eq!(snapshot["overall_target"], 90);
        assert_eq!(snapshot["remaining"], 0);
        assert_eq!(snapshot["percent_display"], 100.0);
        assert!(snapshot["percent_complete"].as_f64().unwrap() > 1204.0);
    }

    #[tokio::test]
    async fn test_snapshot_rejects_unusable_cap() {
        let (app, _) = test_app();
        create(&app, "E1", Some(1), 5).await;
        for cap in ["-5", "0", "NaN", "inf"] {
            let response = app
                .clone()
                .oneshot(get_request(&format!("/api/snapshot?cap={}", cap)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "cap={}", cap);
            let body: Value = body_json(response.into_body()).await;
            assert!(body["error"].as_str().unwrap().contains("cap"));
        }

        let response = app.oneshot(get_request("/api/snapshot?cap=5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: Value = body_json(response.into_body()).await;
        assert_eq!(snapshot["percent_display"], 5.0);
    }

    #[tokio::test]
    async fn test_snapshot_without_records() {
        let state = test_state(LineTargets::uniform(1..=8, 30));
        let app = api_router().with_state(state);
        let response = app.oneshot(get_request("/api/snapshot")).await.unwrap();
        let snapshot: Value = body_json(response.into_body()).await;
        assert_eq!(snapshot["overall_produced"], 0);
        assert_eq!(snapshot["overall_target"], 240);
        assert_eq!(snapshot["remaining"], 240);
        assert_eq!(snapshot["percent_complete"], 0.0);
    }

    #[tokio::test]
    async fn test_targets_summary_and_line_performance() {
        let (app, _) = test_app();
        create(&app, "E1", Some(2), 72).await;

        let response = app.clone().oneshot(get_request("/api/targets")).await.unwrap();
        let targets: Value = body_json(response.into_body()).await;
        assert_eq!(targets, json!({"1": 10, "2": 80}));

        let response = app.clone().oneshot(get_request("/api/summary")).await.unwrap();
        let summary: Value = body_json(response.into_body()).await;
        assert_eq!(summary["total_production"], 72);
        assert_eq!(summary["efficiency_rate"], 80.0);
        assert_eq!(summary["active_workers"], 1);

        let response = app.oneshot(get_request("/api/line-performance")).await.unwrap();
        let rows: Vec<Value> = body_json(response.into_body()).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["line"], 2);
        assert_eq!(rows[1]["efficiency"], 90);
        assert_eq!(rows[1]["status"], "Good");
    }

    #[tokio::test]
    async fn test_leading_line() {
        let (app, _) = test_app();
        let response = app.clone().oneshot(get_request("/api/leading-line")).await.unwrap();
        let none: Value = body_json(response.into_body()).await;
        assert!(none.is_null());

        create(&app, "E1", Some(1), 30).await;
        create(&app, "E2", Some(2), 20).await;
        create(&app, "E3", Some(2), 25).await;

        let response = app.oneshot(get_request("/api/leading-line?top=1")).await.unwrap();
        let leading: Value = body_json(response.into_body()).await;
        assert_eq!(leading["line"], 2);
        assert_eq!(leading["total"], 45);
        assert_eq!(leading["top"].as_array().unwrap().len(), 1);
        assert_eq!(leading["top"][0]["pcs"], 25);
    }

    #[tokio::test]
    async fn test_scans_and_defect_rate() {
        let (app, state) = test_app();
        let mut rx = state.events_tx.subscribe();

        for tag in ["T1", "T2", "T3", "T4"] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/scans", json!({"tag_uid": tag, "line": 1})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let scan = rx.recv().await.unwrap();
        assert_eq!(scan.topic, Topic::ScanRecorded);
        assert!(scan.data.is_none());

        let response = app.clone().oneshot(get_request("/api/scan-count")).await.unwrap();
        let count: ScanCount = body_json(response.into_body()).await;
        assert_eq!(count.count, 4);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/defects",
                json!({"tag_uid": "T1", "Defects": [{"section": 1, "type": 3, "subtype": 0}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(get_request("/api/defects")).await.unwrap();
        let defects: Vec<Value> = body_json(response.into_body()).await;
        assert_eq!(defects[0]["Defects"][0]["type"], 3);

        let response = app.oneshot(get_request("/api/defect-rate")).await.unwrap();
        let summary: Value = body_json(response.into_body()).await;
        assert_eq!(summary["produced"], 4);
        assert_eq!(summary["defective_units"], 1);
        assert_eq!(summary["rate"], 25.0);
        assert_eq!(summary["status"], "Poor");
    }

    #[tokio::test]
    async fn test_defect_rate_without_production_is_zero() {
        let (app, _) = test_app();
        let response = app.oneshot(get_request("/api/defect-rate")).await.unwrap();
        let summary: Value = body_json(response.into_body()).await;
        assert_eq!(summary["rate"], 0.0);
    }

    #[tokio::test]
    async fn test_line_efficiency_report_scales_targets() {
        let (app, _) = test_app();
        create(&app, "E1", Some(1), 35).await;
        create(&app, "E2", Some(1), 0).await;
        create(&app, "E3", None, 8).await;

        let response = app
            .clone()
            .oneshot(get_request("/api/reports/line-efficiency/weekly"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: Value = body_json(response.into_body()).await;
        assert_eq!(report["report"], "line-efficiency");
        assert_eq!(report["period"], "weekly");
        let rows = report["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["category"], "Line 1");
        assert_eq!(rows[0]["value"], 35);
        assert_eq!(rows[0]["target"], 70);
        assert_eq!(rows[0]["percentage"], 50.0);
        assert_eq!(rows[0]["status"], "Poor");
        assert_eq!(rows[1]["category"], "Unassigned");
        assert_eq!(rows[1]["target"], 800 * 7);

        // Same rows under the per-employee name; unknown periods read as today.
        let response = app
            .oneshot(get_request("/api/reports/employee-efficiency/fortnightly"))
            .await
            .unwrap();
        let report: Value = body_json(response.into_body()).await;
        assert_eq!(report["period"], "today");
        assert_eq!(report["report"], "employee-efficiency");
    }

    #[tokio::test]
    async fn test_defect_rate_and_plan_reports() {
        let (app, _) = test_app();
        create(&app, "E1", Some(1), 200).await;
        for body in [
            json!({"tag_uid": "T1", "Defects": [{"section": 1, "type": 1, "subtype": 0}]}),
            json!({"tag_uid": "T2", "Defects": []}),
        ] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/defects", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(get_request("/api/reports/defect-rate/monthly"))
            .await
            .unwrap();
        let report: Value = body_json(response.into_body()).await;
        let row = &report["data"][0];
        assert_eq!(row["category"], "Overall Production");
        assert_eq!(row["value"], 1);
        assert_eq!(row["target"], 2);
        assert_eq!(row["percentage"], 0.5);
        assert_eq!(row["status"], "Excellent");

        let today = chrono::Local::now().date_naive();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/production-plans",
                json!({
                    "product": "Polo",
                    "total_stock": 1000,
                    "finished_units": 900,
                    "start_date": today - chrono::Days::new(3),
                    "end_date": today + chrono::Days::new(3),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(get_request("/api/reports/target-achievement/today"))
            .await
            .unwrap();
        let report: Value = body_json(response.into_body()).await;
        assert_eq!(report["data"][0]["category"], "Polo");
        assert_eq!(report["data"][0]["percentage"], 90.0);
        assert_eq!(report["data"][0]["status"], "Good");

        let response = app.oneshot(get_request("/api/reports/throughput/today")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_production_plans() {
        let (app, state) = test_app();
        let mut rx = state.events_tx.subscribe();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/production-plans",
                json!({
                    "product": "Polo",
                    "total_stock": 1000,
                    "finished_units": 100,
                    "start_date": "2025-01-01",
                    "end_date": "2025-01-31"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let plan: Value = body_json(response.into_body()).await;
        assert_eq!(plan["remaining_units"], 900);
        assert_eq!(rx.recv().await.unwrap().topic, Topic::PlanChanged);

        let id = plan["id"].as_i64().unwrap();
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/production-plans/{}", id),
                json!({"finished_units": 1000}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let plan: Value = body_json(response.into_body()).await;
        assert_eq!(plan["remaining_units"], 0);
        assert_eq!(plan["daily_target"], 0.0);

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/production-plans/77", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/production-plans")).await.unwrap();
        let plans: Vec<Value> = body_json(response.into_body()).await;
        assert_eq!(plans.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_with_inverted_dates_rejected() {
        let (app, _) = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/production-plans",
                json!({
                    "product": "Tee",
                    "total_stock": 10,
                    "start_date": "2025-02-01",
                    "end_date": "2025-01-01"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
