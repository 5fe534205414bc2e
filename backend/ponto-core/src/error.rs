// src/error.rs
use axum::http::StatusCode as AxumStatusCode;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::session::{MSG_LOAD_FAILED, MSG_NOT_LOADED};

// --- Domain Errors ---

/// Errors raised by the calendar, reconciliation and form layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimesheetError {
    #[error("Invalid month index {0}; expected 0..=11")]
    InvalidMonth(u32),

    #[error("Year {0} is outside the supported calendar range")]
    InvalidYear(i32),

    #[error("Day index {index} is out of range for a month with {len} days")]
    DayIndexOutOfRange { index: usize, len: usize },

    #[error("Unknown time slot '{0}'")]
    UnknownSlot(String),

    #[error("Unknown day status '{0}'")]
    UnknownStatus(String),

    #[error("Day {day} falls on {weekday}; weekends take no status")]
    StatusOnWeekend { day: u32, weekday: String },
}

// --- Document Store Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document path segment '{0}'")]
    InvalidPath(String),

    #[error("Stored document at '{path}' is not a JSON object")]
    MalformedDocument { path: String },
}

// Helper to create context-aware IO errors
pub fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> StoreError {
    StoreError::Io {
        source: source.into(),
        context: context.into(),
    }
}

// --- Auth Errors ---

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity file error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("Identity file is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("Pre-issued auth token is empty")]
    EmptyToken,
}

// --- Report Errors ---

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to load the letterhead image from {source_desc}: {message}")]
    Letterhead {
        source_desc: String,
        message: String,
    },

    #[error("Letterhead download failed")]
    LetterheadRequest(#[from] reqwest::Error),

    #[error("PDF assembly failed")]
    Pdf(#[from] lopdf::Error),

    #[error("CSV export failed")]
    Csv(#[from] csv::Error),

    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// --- Configuration Errors ---

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("TLS requires both PONTO_CERT_PATH and PONTO_KEY_PATH")]
    PartialTls,
}

// --- Application Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Timesheet(#[from] TimesheetError),

    #[error("Document store error")]
    Store(#[from] StoreError),

    #[error("Report generation error")]
    Report(#[from] ReportError),

    #[error("Failed to load the selected month")]
    Load(#[source] StoreError),

    #[error("Saving is unavailable: the document store is not connected")]
    SaveUnavailable,

    #[error("Saving is blocked until the selected month has loaded")]
    MonthNotLoaded,

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            AppError::Timesheet(e) => {
                warn!("Rejected timesheet operation: {}", e);
                (AxumStatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                (AxumStatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::SaveUnavailable => (
                AxumStatusCode::SERVICE_UNAVAILABLE,
                "Não foi possível salvar. Verifique a conexão.".to_string(),
            ),
            AppError::MonthNotLoaded => (AxumStatusCode::CONFLICT, MSG_NOT_LOADED.to_string()),
            AppError::Load(store_err) => {
                error!("Failed to load month: {:?}", store_err);
                let status = match store_err {
                    StoreError::InvalidPath(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
                    _ => AxumStatusCode::BAD_GATEWAY,
                };
                (status, MSG_LOAD_FAILED.to_string())
            }
            AppError::Store(store_err) => {
                error!("Document store error: {:?}", store_err);
                (
                    AxumStatusCode::BAD_GATEWAY,
                    "Erro ao salvar os dados.".to_string(),
                )
            }
            AppError::Report(report_err) => match report_err {
                ReportError::Letterhead { .. } | ReportError::LetterheadRequest(_) => {
                    error!("Letterhead unavailable: {}", report_err);
                    (
                        AxumStatusCode::BAD_GATEWAY,
                        "Erro ao gerar PDF. Falha ao carregar a imagem do logotipo.".to_string(),
                    )
                }
                _ => {
                    error!("Report rendering failed: {:?}", report_err);
                    (
                        AxumStatusCode::INTERNAL_SERVER_ERROR,
                        "Erro ao gerar PDF.".to_string(),
                    )
                }
            },
        };
        (
            status_code,
            Json(serde_json::json!({ "error": error_message })),
        )
            .into_response()
    }
}
