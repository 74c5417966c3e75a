//! REST API handlers for the duty scheduling service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::config::Config;
use crate::demo_data::{self, DemoData};
use crate::dto::{HealthResponse, InfoResponse, ScheduleRequest, ScheduleResponse, SeniorScheduleRequest};
use crate::error::AppError;
use crate::solver::{SchedulerSolver, SeniorSchedulerSolver};

/// Application state shared across handlers; the configuration is loaded
/// once and read-only for the process lifetime.
pub struct AppState {
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

/// Sets the solver's cooperative stop flag when the request future is
/// dropped, so an aborted caller stops the search at the next check
/// point instead of burning the full time budget.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Duty mode
        .route("/schedule/compute", post(compute_schedule))
        .route("/schedule/health", get(schedule_health))
        // Senior mode
        .route("/schedule/senior/compute", post(compute_senior_schedule))
        .route("/schedule/senior/health", get(senior_health))
        // Service info & demo data
        .route("/info", get(info))
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}", get(get_demo_data))
        .with_state(state)
}

// ============================================================================
// Health & info
// ============================================================================

/// GET /schedule/health - duty-mode liveness, no solving.
async fn schedule_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "scheduler",
    })
}

/// GET /schedule/senior/health - senior-mode liveness, no solving.
async fn senior_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "senior-scheduler",
    })
}

/// GET /info - application info.
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Duty Scheduling",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "cp-bnb",
    })
}

// ============================================================================
// Solve endpoints
// ============================================================================

/// POST /schedule/compute - duty-mode roster optimization.
///
/// Returns 200 for every solved request including `INFEASIBLE`, 400 on
/// malformed or invalid input, 500 on an internal solver fault.
async fn compute_schedule(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    tracing::info!(
        period = %request.period.name,
        users = request.users.len(),
        slots = request.slots.len(),
        "computing duty schedule"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let _guard = StopOnDrop(stop.clone());
    let solver = SchedulerSolver::new(state.config.clone());
    let result = tokio::task::spawn_blocking(move || solver.solve_with_stop(&request, Some(stop)))
        .await
        .map_err(|e| AppError::Solver(format!("solve task failed: {e}")))?;
    let response = result?;

    tracing::info!(
        assignments = response.assignments.len(),
        status = %response.meta.solver_status,
        time_ms = response.meta.solve_time_ms,
        "duty schedule computed"
    );
    Ok(Json(response))
}

/// POST /schedule/senior/compute - senior-mode segment optimization.
async fn compute_senior_schedule(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SeniorScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    tracing::info!(
        period = %request.period.name,
        users = request.users.len(),
        slots = request.slots.len(),
        "computing senior schedule"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let _guard = StopOnDrop(stop.clone());
    let solver = SeniorSchedulerSolver::new(state.config.clone());
    let result = tokio::task::spawn_blocking(move || solver.solve_with_stop(&request, Some(stop)))
        .await
        .map_err(|e| AppError::Solver(format!("solve task failed: {e}")))?;
    let response = result?;

    tracing::info!(
        assignments = response.assignments.len(),
        status = %response.meta.solver_status,
        time_ms = response.meta.solve_time_ms,
        "senior schedule computed"
    );
    Ok(Json(response))
}

// ============================================================================
// Demo data
// ============================================================================

/// GET /demo-data - list available demo data sets.
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /demo-data/{id} - a generated request body for manual testing.
async fn get_demo_data(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    let Ok(demo) = id.parse::<DemoData>() else {
        return Err(StatusCode::NOT_FOUND);
    };
    let value = match demo_data::generate(demo) {
        demo_data::DemoRequest::Duty(request) => serde_json::to_value(request),
        demo_data::DemoRequest::Senior(request) => serde_json::to_value(request),
    }
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(value))
}
