// src/main.rs
use anyhow::{Context, Result};
use axum::http::StatusCode as AxumStatusCode;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    env,
    net::SocketAddr,
    sync::Arc,
    time::{Duration as StdDuration, Instant},
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod assignments;
mod calendar_grid;
mod hr_api;
mod schedule_service;
mod shift_catalog;

mod schedule_tests;

use assignments::{AssignmentDraft, Employee};
use calendar_grid::ScheduleMonth;
use hr_api::{HrApiClient, HrApiConfig, HrApiError};
use schedule_service::{
    AssignmentCandidate, DayView, MonthView, ScheduleError, ScheduleService, ViewState,
};
use shift_catalog::{ShiftKind, ShiftTypeInfo};

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Scheduling error")]
    Schedule(#[from] ScheduleError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Error occurred: {:?}", self);
        let (status_code, error_message) = match &self {
            AppError::MissingEnvVar(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error.".to_string(),
            ),
            AppError::TlsConfig(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server TLS configuration error.".to_string(),
            ),
            AppError::BadRequest(msg) => (AxumStatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Schedule(schedule_err) => match schedule_err {
                ScheduleError::AssignmentConflict { names, .. } => (
                    AxumStatusCode::CONFLICT,
                    format!("Already assigned that day: {}.", names.join(", ")),
                ),
                ScheduleError::SubmissionInFlight => (
                    AxumStatusCode::CONFLICT,
                    "A submission is already in progress.".to_string(),
                ),
                ScheduleError::ViewNotReady { date } => (
                    AxumStatusCode::PRECONDITION_FAILED,
                    format!("No loaded schedule covers {}; load the month first.", date),
                ),
                ScheduleError::EmptySelection { .. } => (
                    AxumStatusCode::UNPROCESSABLE_ENTITY,
                    "No employees selected.".to_string(),
                ),
                ScheduleError::SubmissionFailed { source } => {
                    error!("Submission failed upstream: {}", source);
                    (
                        AxumStatusCode::BAD_GATEWAY,
                        "The HR API rejected or failed the submission; the schedule was left unchanged.".to_string(),
                    )
                }
                ScheduleError::Api(api_err) => match api_err {
                    HrApiError::RateLimitExceeded => (
                        AxumStatusCode::TOO_MANY_REQUESTS,
                        "HR API rate limit exceeded. Please try again later.".to_string(),
                    ),
                    HrApiError::ApiError { status, message } => {
                        let axum_status = AxumStatusCode::from_u16(status.as_u16())
                            .unwrap_or(AxumStatusCode::INTERNAL_SERVER_ERROR);
                        error!("HR API Error: Status={}, Msg={}", status, message);
                        (
                            axum_status,
                            "An error occurred while communicating with the HR API.".to_string(),
                        )
                    }
                    HrApiError::Request(e) => {
                        error!("Network request error to HR API: {}", e);
                        (
                            AxumStatusCode::BAD_GATEWAY,
                            "Failed to connect to the HR API.".to_string(),
                        )
                    }
                    HrApiError::Json(e) => {
                        error!("JSON processing error for HR API data: {}", e);
                        (
                            AxumStatusCode::INTERNAL_SERVER_ERROR,
                            "Internal error processing HR API data.".to_string(),
                        )
                    }
                    HrApiError::UrlParse(e) => {
                        error!("URL parsing error for HR API request: {}", e);
                        (
                            AxumStatusCode::INTERNAL_SERVER_ERROR,
                            "Internal server error (HR API URL config).".to_string(),
                        )
                    }
                    HrApiError::MissingToken => (
                        AxumStatusCode::INTERNAL_SERVER_ERROR,
                        "Server configuration error.".to_string(),
                    ),
                },
            },
        };
        (
            status_code,
            Json(serde_json::json!({ "error": error_message })),
        )
            .into_response()
    }
}

// --- Configuration ---

#[derive(Debug, Clone)]
struct AppConfig {
    cert_path: String,
    key_path: String,
    server_addr: String,
    roster_refresh_hours: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub schedule: Arc<ScheduleService>,
    pub started_at: Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;
    info!("Tracing subscriber initialized.");

    let app_config = load_app_config()?;
    info!("App configuration loaded.");
    let hr_api_config = load_hr_api_config()?;
    info!("HR API configuration loaded.");

    let hr_client = Arc::new(HrApiClient::new(hr_api_config)?);
    info!("HR API client initialized.");

    let schedule_service = Arc::new(ScheduleService::new(hr_client));
    info!("Scheduling service initialized.");

    // Warm the roster cache at startup (non-blocking).
    let warmup_service = schedule_service.clone();
    tokio::spawn(async move {
        info!("Performing initial roster fetch...");
        if let Err(e) = warmup_service.refresh_roster().await {
            error!("Initial roster fetch failed: {}", e);
        }
    });

    // Periodic Roster Refresh Task
    let refresh_interval = StdDuration::from_secs(app_config.roster_refresh_hours * 60 * 60);
    let periodic_service = schedule_service.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(refresh_interval).await;
            info!("Starting periodic roster refresh...");
            if let Err(e) = periodic_service.refresh_roster().await {
                error!("Periodic roster refresh failed: {}", e);
            }
        }
    });

    let app_state = AppState {
        schedule: schedule_service,
        started_at: Instant::now(),
    };
    info!("Application state initialized.");

    let app = build_router(app_state);

    let tls_config = load_tls_config(&app_config).await?;
    info!("TLS configuration loaded.");

    let addr: SocketAddr = app_config
        .server_addr
        .parse()
        .with_context(|| format!("Invalid SERVER_ADDR '{}'", app_config.server_addr))?;
    info!("Starting server on https://{}", addr);
    axum_server::bind_rustls(addr, tls_config)
        .serve(app.into_make_service())
        .await
        .context("HTTPS server failed")?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let schedule_routes = Router::new()
        .route("/month", get(handle_month_view))
        .route("/day", get(handle_day_view).delete(handle_close_day))
        .route("/day/candidates", get(handle_candidates))
        .route("/employees", get(handle_employees))
        .route("/shift-types", get(handle_shift_types))
        .route("/assignments", post(handle_submit_assignment));
    let api_routes = Router::new().nest("/schedule", schedule_routes);
    Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn load_app_config() -> Result<AppConfig, AppError> {
    Ok(AppConfig {
        cert_path: env::var("CERT_PATH")
            .map_err(|_| AppError::MissingEnvVar("CERT_PATH".to_string()))?,
        key_path: env::var("KEY_PATH")
            .map_err(|_| AppError::MissingEnvVar("KEY_PATH".to_string()))?,
        server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
        roster_refresh_hours: env::var("ROSTER_REFRESH_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(6),
    })
}

fn load_hr_api_config() -> Result<HrApiConfig, AppError> {
    Ok(HrApiConfig {
        base_url: env::var("HR_API_BASE_URL")
            .map_err(|_| AppError::MissingEnvVar("HR_API_BASE_URL".to_string()))?,
        api_token: env::var("HR_API_TOKEN")
            .map_err(|_| AppError::MissingEnvVar("HR_API_TOKEN".to_string()))?,
        request_timeout_secs: env::var("HR_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(hr_api::DEFAULT_REQUEST_TIMEOUT_SECS),
    })
}

async fn load_tls_config(config: &AppConfig) -> Result<RustlsConfig, AppError> {
    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e)))
}

// --- Handlers ---

#[derive(Debug, Deserialize)]
struct MonthQuery {
    year: i32,
    month: u32,
}

#[derive(Debug, Deserialize)]
struct DayQuery {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAssignmentBody {
    date: NaiveDate,
    shift_type: String,
    employee_ids: Vec<String>,
}

async fn handle_month_view(
    State(state): State<AppState>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<MonthView>, AppError> {
    info!(
        "Handling /api/schedule/month request for {}-{}...",
        params.year, params.month
    );
    let month = ScheduleMonth::new(params.year, params.month).ok_or_else(|| {
        AppError::BadRequest(format!(
            "{}-{} is not a calendar month",
            params.year, params.month
        ))
    })?;
    let view = state.schedule.load_month(month).await?;
    Ok(Json(view))
}

async fn handle_day_view(
    State(state): State<AppState>,
    Query(params): Query<DayQuery>,
) -> Result<Json<DayView>, AppError> {
    info!("Handling /api/schedule/day request for {}...", params.date);
    let view = state.schedule.open_day(params.date).await?;
    Ok(Json(view))
}

async fn handle_close_day(State(state): State<AppState>) -> AxumStatusCode {
    info!("Handling day panel close...");
    state.schedule.close_day().await;
    AxumStatusCode::NO_CONTENT
}

async fn handle_candidates(
    State(state): State<AppState>,
    Query(params): Query<DayQuery>,
) -> Result<Json<Vec<AssignmentCandidate>>, AppError> {
    info!(
        "Handling /api/schedule/day/candidates request for {}...",
        params.date
    );
    let candidates = state.schedule.assignment_candidates(params.date).await?;
    Ok(Json(candidates))
}

async fn handle_employees(State(state): State<AppState>) -> Result<Json<Vec<Employee>>, AppError> {
    info!("Handling /api/schedule/employees request...");
    let mut roster = state.schedule.roster().await;
    if roster.is_empty() {
        state.schedule.refresh_roster().await?;
        roster = state.schedule.roster().await;
    }
    Ok(Json(roster))
}

async fn handle_shift_types() -> Json<Vec<ShiftTypeInfo>> {
    Json(shift_catalog::catalog())
}

async fn handle_submit_assignment(
    State(state): State<AppState>,
    Json(body): Json<SubmitAssignmentBody>,
) -> Result<AxumStatusCode, AppError> {
    info!(
        "Handling assignment submission for {} ('{}', {} employee(s))...",
        body.date,
        body.shift_type,
        body.employee_ids.len()
    );
    let shift = ShiftKind::from_label(&body.shift_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown shift type '{}'", body.shift_type)))?;

    let mut draft = AssignmentDraft::new(body.date, shift);
    for id in &body.employee_ids {
        draft.select(id);
    }

    state.schedule.submit_assignment(&draft).await?;
    Ok(AxumStatusCode::CREATED)
}

async fn handle_status(State(state): State<AppState>) -> Html<String> {
    info!("Handling /status request...");
    let month_state = state.schedule.month_view().await;
    let day_state = state.schedule.day_view().await;
    let roster_len = state.schedule.roster().await.len();

    let html_body = format!(
        "<h1>Server Status</h1><p>Current Time (Server): {}</p><p>Uptime: {}s</p><hr>\
         <p>Cached Roster: {} employees</p>\
         <p>Month View: {}</p>\
         <p>Day View: {}</p>",
        chrono::Local::now().to_rfc3339(),
        state.started_at.elapsed().as_secs(),
        roster_len,
        describe_view(&month_state),
        describe_view(&day_state)
    );
    Html(html_body)
}

fn describe_view<T>(state: &ViewState<T>) -> String {
    match state {
        ViewState::Idle => "idle".to_string(),
        ViewState::Loading => "loading".to_string(),
        ViewState::Ready(_) => "ready".to_string(),
        ViewState::Failed(msg) => format!("failed ({})", msg),
    }
}
