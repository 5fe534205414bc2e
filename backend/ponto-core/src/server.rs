// src/server.rs
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::AuthClient;
use crate::calendar::{selectable_years, MonthKey, MONTH_NAMES};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::file_store::JsonFileStore;
use crate::model::{DayRecord, HeaderPatch, TimeSlot, TimesheetHeader, ROUTE_OPTIONS, VINCULO_OPTIONS};
use crate::session::{
    DayView, ExportFile, NotificationKind, SessionHandle, SessionSettings, SessionStatus,
    TimesheetView, MSG_AUTH_FAILED, MSG_STORE_OFFLINE,
};
use crate::status::{parse_optional_status, DayStatus};
use crate::store::DocumentStore;

// --- State ---

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionHandle>,
    pub clock: Arc<dyn Clock>,
}

// --- Bootstrap ---

/// Wires store, auth and session from configuration and loads the current
/// month. Store and auth failures degrade to local-only mode instead of
/// aborting startup.
pub async fn bootstrap(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<AppState, AppError> {
    let mut startup_warnings = Vec::new();

    let store: Option<Arc<dyn DocumentStore>> = match &config.data_dir {
        Some(dir) => match JsonFileStore::open(dir) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                error!("Document store unavailable, continuing local-only: {}", e);
                startup_warnings.push(MSG_STORE_OFFLINE);
                None
            }
        },
        None => {
            warn!("No data directory configured; running in local-only mode");
            None
        }
    };

    let user_id = match &store {
        Some(_) => {
            let auth = AuthClient::new(
                config.auth_token().map(str::to_string),
                config.identity_file.clone(),
            );
            match auth.sign_in().await {
                Ok(identity) => Some(identity.user_id),
                Err(e) => {
                    error!("Authentication failed: {}", e);
                    startup_warnings.push(MSG_AUTH_FAILED);
                    None
                }
            }
        }
        None => None,
    };

    let settings = SessionSettings {
        app_id: config.app_id.clone(),
        letterhead: config.letterhead.clone(),
    };
    let session = Arc::new(SessionHandle::new(settings, store, user_id, Arc::clone(&clock))?);
    session
        .select_month(MonthKey::containing(clock.now()))
        .await?;
    for message in startup_warnings {
        session.notify(NotificationKind::Warn, message).await;
    }

    let status = session.status().await;
    info!(
        "Session {} ready ({:?}, month {})",
        status.session_id, status.store_mode, status.month.doc_id
    );
    Ok(AppState { session, clock })
}

// --- Router ---

pub fn app(state: AppState) -> Router {
    let timesheet_routes = Router::new()
        .route("/", get(handle_get_timesheet))
        .route("/month", put(handle_select_month))
        .route("/header", patch(handle_update_header))
        .route("/days/{index}/times/{slot}", put(handle_set_time))
        .route("/days/{index}/times/{slot}/now", post(handle_stamp_time))
        .route("/days/{index}/status", put(handle_set_status))
        .route("/save", post(handle_save))
        .route("/export/pdf", get(handle_export_pdf))
        .route("/export/csv", get(handle_export_csv));

    let api_routes = Router::new()
        .nest("/timesheet", timesheet_routes)
        .route("/options", get(handle_options));

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Request Bodies ---

#[derive(Debug, Deserialize)]
pub struct MonthRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct TimeValueRequest {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

// --- Handlers ---

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status().await)
}

async fn handle_get_timesheet(State(state): State<AppState>) -> Json<TimesheetView> {
    Json(state.session.view().await)
}

async fn handle_select_month(
    State(state): State<AppState>,
    Json(request): Json<MonthRequest>,
) -> Result<Json<TimesheetView>, AppError> {
    let month = MonthKey::new(request.year, request.month)?;
    info!("Selecting month {}", month.doc_id());
    state.session.select_month(month).await?;
    Ok(Json(state.session.view().await))
}

async fn handle_update_header(
    State(state): State<AppState>,
    Json(patch): Json<HeaderPatch>,
) -> Json<TimesheetHeader> {
    Json(state.session.update_header(patch).await)
}

fn day_view(record: DayRecord) -> DayView {
    DayView {
        non_workday: record.is_non_workday(),
        record,
    }
}

async fn handle_set_time(
    State(state): State<AppState>,
    Path((index, slot)): Path<(usize, String)>,
    Json(request): Json<TimeValueRequest>,
) -> Result<Json<DayView>, AppError> {
    let slot: TimeSlot = slot.parse()?;
    let record = state.session.set_time(index, slot, &request.value).await?;
    Ok(Json(day_view(record)))
}

async fn handle_stamp_time(
    State(state): State<AppState>,
    Path((index, slot)): Path<(usize, String)>,
) -> Result<Json<DayView>, AppError> {
    let slot: TimeSlot = slot.parse()?;
    let record = state.session.stamp_time(index, slot).await?;
    Ok(Json(day_view(record)))
}

async fn handle_set_status(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<DayView>, AppError> {
    let status = parse_optional_status(request.status.as_deref().unwrap_or(""))?;
    let record = state.session.set_status(index, status).await?;
    Ok(Json(day_view(record)))
}

async fn handle_save(State(state): State<AppState>) -> Result<Json<TimesheetView>, AppError> {
    state.session.save().await?;
    Ok(Json(state.session.view().await))
}

/// `attachment` disposition with an ASCII fallback name and the UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", ascii, encoded)
}

fn attachment(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
        ],
        file.bytes,
    )
        .into_response()
}

async fn handle_export_pdf(State(state): State<AppState>) -> Result<Response, AppError> {
    let file = state.session.export_pdf().await?;
    info!("Serving {} ({} bytes)", file.file_name, file.bytes.len());
    Ok(attachment(file))
}

async fn handle_export_csv(State(state): State<AppState>) -> Result<Response, AppError> {
    let file = state.session.export_csv().await?;
    info!("Serving {} ({} bytes)", file.file_name, file.bytes.len());
    Ok(attachment(file))
}

// --- Options ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOption {
    pub key: &'static str,
    pub label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsView {
    pub months: Vec<&'static str>,
    pub years: Vec<i32>,
    pub statuses: Vec<&'static str>,
    pub vinculo_options: Vec<&'static str>,
    pub route_options: Vec<&'static str>,
    pub time_slots: Vec<SlotOption>,
}

async fn handle_options(State(state): State<AppState>) -> Json<OptionsView> {
    Json(OptionsView {
        months: MONTH_NAMES.to_vec(),
        years: selectable_years(state.clock.now().year()),
        statuses: DayStatus::ALL.iter().map(DayStatus::label).collect(),
        vinculo_options: VINCULO_OPTIONS.to_vec(),
        route_options: ROUTE_OPTIONS.to_vec(),
        time_slots: TimeSlot::ALL
            .iter()
            .map(|slot| SlotOption {
                key: slot.key(),
                label: slot.label(),
            })
            .collect(),
    })
}
