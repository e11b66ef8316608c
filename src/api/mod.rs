use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{delete, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{ScheduleDetail, ScheduleFilter, SchedulePage, SummaryPage};
use crate::services::ScheduleService;
use crate::state::AppState;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    hoscode: Option<String>,
    #[serde(default)]
    depcode: Option<String>,
    #[serde(default)]
    work_date: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/hosp/schedules", post(ingest_schedule).get(list_schedules))
        .route(
            "/api/hosp/schedules/{hoscode}/{hos_schedule_id}",
            delete(withdraw_schedule),
        )
        .route(
            "/api/hosp/schedules/summary/{hoscode}/{depcode}",
            get(summary_query),
        )
        .route(
            "/api/hosp/schedules/detail/{hoscode}/{depcode}/{work_date}",
            get(detail_query),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn ingest_schedule(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<StatusCode, AppError> {
    let service = ScheduleService::new(state.db.clone(), state.resolver.clone());
    service.ingest(&payload).await?;
    Ok(StatusCode::OK)
}

async fn withdraw_schedule(
    State(state): State<AppState>,
    Path((hoscode, hos_schedule_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let service = ScheduleService::new(state.db.clone(), state.resolver.clone());
    service.withdraw(&hoscode, &hos_schedule_id).await?;
    Ok(StatusCode::OK)
}

async fn summary_query(
    State(state): State<AppState>,
    Path((hoscode, depcode)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Result<Json<SummaryPage>, AppError> {
    let service = ScheduleService::new(state.db.clone(), state.resolver.clone());
    let page = service
        .summary(&hoscode, &depcode, params.page, params.limit)
        .await?;
    Ok(Json(page))
}

async fn detail_query(
    State(state): State<AppState>,
    Path((hoscode, depcode, work_date)): Path<(String, String, String)>,
) -> Result<Json<Vec<ScheduleDetail>>, AppError> {
    let service = ScheduleService::new(state.db.clone(), state.resolver.clone());
    let details = service.detail(&hoscode, &depcode, &work_date).await?;
    Ok(Json(details))
}

async fn list_schedules(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<SchedulePage>, AppError> {
    let filter = ScheduleFilter {
        hoscode: params.hoscode,
        depcode: params.depcode,
        work_date: params.work_date,
    };
    let service = ScheduleService::new(state.db.clone(), state.resolver.clone());
    let page = service.page(params.page, params.limit, &filter).await?;
    Ok(Json(page))
}
