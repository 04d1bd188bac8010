use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::capacity::CapacityEntry;
use crate::classifier::{
    BoundsMode, ClassificationFailure, ConditionSet, FailureReason, Verdict, VerdictRecord,
};
use crate::services::{AnalysisService, BatchEntry, BatchReport};

#[derive(Clone)]
pub struct AppState {
    pub analysis_service: AnalysisService,
    pub default_bounds_mode: BoundsMode,
    pub max_upload_bytes: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyzeParams {
    /// Reporting period label, e.g. "2024-03"
    pub period: Option<String>,
    /// "table" (capacity table) or "per-sample" (instrument bounds)
    pub bounds: Option<BoundsMode>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_capacity, analyze_workbook),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        CapacityEntry,
        BatchReport,
        BatchEntry,
        VerdictRecord,
        ConditionSet,
        Verdict,
        BoundsMode,
        ClassificationFailure,
        FailureReason
    )),
    tags((name = "gas-meter-analyzer", description = "Gas meter operating range analysis"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/capacity", get(get_capacity))
        .route(
            "/analyze",
            post(analyze_workbook).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/capacity",
    responses((status = 200, description = "Rated flow per meter size", body = [CapacityEntry]))
)]
#[instrument(skip(state))]
async fn get_capacity(State(state): State<AppState>) -> Json<Vec<CapacityEntry>> {
    let entries = state.analysis_service.capacity_table().entries();
    debug!("Returning {} capacity entries", entries.len());
    Json(entries)
}

#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    params(AnalyzeParams),
    request_body(content = Vec<u8>, content_type = "application/octet-stream", description = "XLS/XLSX workbook"),
    responses(
        (status = 200, description = "Per-sheet classification", body = BatchReport),
        (status = 400, description = "Empty upload", body = ErrorResponse),
        (status = 413, description = "Workbook too large"),
        (status = 422, description = "Workbook could not be read", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body), fields(bytes = body.len()))]
async fn analyze_workbook(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    body: Bytes,
) -> Result<Json<BatchReport>, ApiError> {
    if body.is_empty() {
        warn!("Rejected empty workbook upload");
        return Err(api_error(StatusCode::BAD_REQUEST, "request body is empty"));
    }

    let mode = params.bounds.unwrap_or(state.default_bounds_mode);
    let period = params.period;
    debug!("Analyzing upload for period {:?} with {:?} bounds", period, mode);

    let service = state.analysis_service.clone();
    let report = tokio::task::spawn_blocking(move || {
        service.analyze_bytes(body.to_vec(), period.as_deref(), mode)
    })
    .await
    .map_err(|e| {
        error!("Analysis task failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "analysis task failed")
    })?
    .map_err(|e| {
        warn!("Rejected unreadable workbook: {}", e);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    info!(
        "Analyzed workbook: {} classified, {} failed",
        report.classified, report.failed
    );
    Ok(Json(report))
}
