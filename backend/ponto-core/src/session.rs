// src/session.rs
use chrono::{Duration, NaiveDateTime};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::calendar::MonthKey;
use crate::clock::Clock;
use crate::error::{AppError, StoreError};
use crate::form::FormState;
use crate::letterhead::Letterhead;
use crate::model::{DayRecord, HeaderPatch, MonthDocument, TimeSlot, TimesheetHeader};
use crate::report::{render_pdf, report_file_name, ReportInput};
use crate::report_csv::{csv_file_name, render_csv};
use crate::status::DayStatus;
use crate::store::{DocumentPath, DocumentStore, SnapshotEvent};

// --- Notifications ---

pub const MSG_SAVED: &str = "Dados salvos com sucesso!";
pub const MSG_SAVE_FAILED: &str = "Erro ao salvar os dados.";
pub const MSG_SAVE_UNAVAILABLE: &str = "Não foi possível salvar. Verifique a conexão.";
pub const MSG_LOAD_FAILED: &str = "Erro ao carregar dados.";
pub const MSG_AUTH_FAILED: &str = "Falha na autenticação.";
pub const MSG_STORE_OFFLINE: &str = "Banco de dados indisponível. Os dados não serão salvos.";
pub const MSG_PDF_DONE: &str = "PDF gerado com sucesso!";
pub const MSG_PDF_FAILED: &str = "Erro ao gerar PDF.";
pub const MSG_STILL_LOADING: &str = "Aguarde o carregamento dos dados.";
pub const MSG_NOT_LOADED: &str = "Os dados do mês não foram carregados. Salvar agora apagaria os registros existentes.";

pub const NOTIFICATION_TTL_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: NaiveDateTime,
}

impl Notification {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now - self.raised_at >= Duration::seconds(NOTIFICATION_TTL_SECS)
    }
}

// --- Session State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreMode {
    Connected,
    LocalOnly,
}

#[derive(Debug)]
struct TimesheetSession {
    form: FormState,
    loading: bool,
    // Set once the selected month's stored document has been applied; saving
    // before that would overwrite it with the blank template.
    loaded: bool,
    // Bumped on every month switch; snapshots tagged with an older value are dropped.
    generation: u64,
    notification: Option<Notification>,
}

impl TimesheetSession {
    fn notify(&mut self, kind: NotificationKind, message: &str, now: NaiveDateTime) {
        self.notification = Some(Notification {
            kind,
            message: message.to_string(),
            raised_at: now,
        });
    }

    fn live_notification(&self, now: NaiveDateTime) -> Option<Notification> {
        self.notification
            .as_ref()
            .filter(|n| !n.is_expired(now))
            .cloned()
    }
}

// --- Views ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub doc_id: String,
}

impl From<MonthKey> for MonthView {
    fn from(key: MonthKey) -> Self {
        Self {
            year: key.year(),
            month: key.month(),
            month_name: key.month_name(),
            doc_id: key.doc_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    #[serde(flatten)]
    pub record: DayRecord,
    pub non_workday: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetView {
    pub month: MonthView,
    pub header: TimesheetHeader,
    pub records: Vec<DayView>,
    pub loading: bool,
    pub store_mode: StoreMode,
    pub can_save: bool,
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub store_mode: StoreMode,
    pub store: Option<String>,
    pub user_id: Option<String>,
    pub month: MonthView,
    pub loading: bool,
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

// --- Snapshot Application ---

/// The part of the session a listener task needs to apply pushed snapshots.
#[derive(Clone)]
struct SnapshotApplier {
    origin: String,
    state: Arc<Mutex<TimesheetSession>>,
    clock: Arc<dyn Clock>,
}

impl SnapshotApplier {
    async fn apply(&self, generation: u64, event: SnapshotEvent) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!("Dropping snapshot for a month no longer selected");
            return;
        }

        let snapshot = match event {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load timesheet: {}", e);
                state.notify(NotificationKind::Error, MSG_LOAD_FAILED, self.clock.now());
                state.loading = false;
                return;
            }
        };

        if snapshot.is_from(&self.origin) {
            // Our own save coming back; the form already holds it plus any newer edits.
            debug!("Ignoring echo of own write to {}", snapshot.path);
            state.loading = false;
            return;
        }

        match snapshot.decode::<MonthDocument>() {
            Ok(document) => {
                let month = state.form.month();
                if let Err(e) = state.form.load(month, document.as_ref()) {
                    error!("Failed to reconcile {}: {}", snapshot.path, e);
                    state.notify(NotificationKind::Error, MSG_LOAD_FAILED, self.clock.now());
                } else {
                    state.loaded = true;
                    info!(
                        "Applied snapshot of {} (exists: {}, origin: {:?})",
                        snapshot.path,
                        snapshot.exists(),
                        snapshot.origin
                    );
                }
            }
            Err(e) => {
                error!("Stored document {} could not be decoded: {}", snapshot.path, e);
                state.notify(NotificationKind::Error, MSG_LOAD_FAILED, self.clock.now());
            }
        }
        state.loading = false;
    }
}

// --- Session Handle ---

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub app_id: String,
    pub letterhead: Option<String>,
}

/// One timesheet editing session: the form, its month subscription, and the
/// save/export actions. All form mutations go through one async mutex.
pub struct SessionHandle {
    session_id: String,
    settings: SessionSettings,
    store: Option<Arc<dyn DocumentStore>>,
    user_id: Option<String>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<TimesheetSession>>,
    // Held for the whole of a month switch so switches never interleave.
    listener: Mutex<Option<JoinHandle<()>>>,
}

fn generate_session_id() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("session-{}", suffix)
}

impl SessionHandle {
    /// Creates a session on the month containing the clock's current date.
    /// Without both a store and a user id the session runs local-only.
    pub fn new(
        settings: SessionSettings,
        store: Option<Arc<dyn DocumentStore>>,
        user_id: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let month = MonthKey::containing(clock.now());
        let form = FormState::new(month)?;
        Ok(Self {
            session_id: generate_session_id(),
            settings,
            store,
            user_id,
            clock,
            state: Arc::new(Mutex::new(TimesheetSession {
                form,
                loading: false,
                loaded: false,
                generation: 0,
                notification: None,
            })),
            listener: Mutex::new(None),
        })
    }

    pub fn store_mode(&self) -> StoreMode {
        match (&self.store, &self.user_id) {
            (Some(_), Some(_)) => StoreMode::Connected,
            _ => StoreMode::LocalOnly,
        }
    }

    fn connection(&self) -> Option<(&Arc<dyn DocumentStore>, &str)> {
        match (&self.store, &self.user_id) {
            (Some(store), Some(user_id)) => Some((store, user_id.as_str())),
            _ => None,
        }
    }

    fn applier(&self) -> SnapshotApplier {
        SnapshotApplier {
            origin: self.session_id.clone(),
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }

    pub async fn notify(&self, kind: NotificationKind, message: &str) {
        let now = self.clock.now();
        self.state.lock().await.notify(kind, message, now);
    }

    // --- Month selection ---

    /// Switches the form to `month`: tears down the previous subscription,
    /// resets the records to the month's template, subscribes to the month's
    /// document and applies its first snapshot before returning.
    pub async fn select_month(&self, month: MonthKey) -> Result<(), AppError> {
        let mut listener = self.listener.lock().await;
        if let Some(previous) = listener.take() {
            previous.abort();
            // Waiting for the task to wind down drops its subscription.
            let _ = previous.await;
        }

        let connection = self.connection();
        let generation = {
            let mut state = self.state.lock().await;
            state.form.reset_to_template(month)?;
            state.generation += 1;
            state.loading = connection.is_some();
            state.loaded = false;
            state.generation
        };

        let Some((store, user_id)) = connection else {
            info!("Selected {} in local-only mode", month.doc_id());
            return Ok(());
        };

        let path = match DocumentPath::timesheet(&self.settings.app_id, user_id, &month) {
            Ok(path) => path,
            Err(e) => {
                self.state.lock().await.loading = false;
                return Err(AppError::Load(e));
            }
        };
        let mut subscription = store.subscribe(&path).await;
        info!("Subscribed to {}", path);

        let applier = self.applier();
        if let Some(first) = subscription.next().await {
            applier.apply(generation, first).await;
        }

        *listener = Some(tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                applier.apply(generation, event).await;
            }
            debug!("Subscription to {} closed", subscription.path());
        }));
        Ok(())
    }

    /// Stops listening to the current month.
    pub async fn shutdown(&self) {
        if let Some(previous) = self.listener.lock().await.take() {
            previous.abort();
            let _ = previous.await;
        }
    }

    // --- Form mutations ---

    pub async fn update_header(&self, patch: HeaderPatch) -> TimesheetHeader {
        let mut state = self.state.lock().await;
        state.form.update_header(patch);
        state.form.header().clone()
    }

    pub async fn set_time(&self, index: usize, slot: TimeSlot, value: &str) -> Result<DayRecord, AppError> {
        let mut state = self.state.lock().await;
        state.form.set_time(index, slot, value)?;
        Ok(state.form.records()[index].clone())
    }

    /// Fills a slot with the current local time.
    pub async fn stamp_time(&self, index: usize, slot: TimeSlot) -> Result<DayRecord, AppError> {
        let now = self.clock.now().time();
        let mut state = self.state.lock().await;
        let value = state.form.stamp_time(index, slot, now)?;
        debug!("Stamped {} on day index {} with {}", slot, index, value);
        Ok(state.form.records()[index].clone())
    }

    pub async fn set_status(&self, index: usize, status: Option<DayStatus>) -> Result<DayRecord, AppError> {
        let mut state = self.state.lock().await;
        state.form.set_status(index, status)?;
        Ok(state.form.records()[index].clone())
    }

    // --- Reads ---

    pub async fn view(&self) -> TimesheetView {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let store_mode = self.store_mode();
        TimesheetView {
            month: state.form.month().into(),
            header: state.form.header().clone(),
            records: state
                .form
                .records()
                .iter()
                .map(|record| DayView {
                    non_workday: record.is_non_workday(),
                    record: record.clone(),
                })
                .collect(),
            loading: state.loading,
            store_mode,
            can_save: store_mode == StoreMode::Connected && !state.loading && state.loaded,
            notification: state.live_notification(now),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        SessionStatus {
            session_id: self.session_id.clone(),
            store_mode: self.store_mode(),
            store: self.store.as_ref().map(|s| s.describe()),
            user_id: self.user_id.clone(),
            month: state.form.month().into(),
            loading: state.loading,
        }
    }

    // --- Save ---

    /// Upserts the current header and non-empty days under the selected month.
    pub async fn save(&self) -> Result<(), AppError> {
        let Some((store, user_id)) = self.connection() else {
            warn!("Save requested without a connected store");
            self.notify(NotificationKind::Warn, MSG_SAVE_UNAVAILABLE).await;
            return Err(AppError::SaveUnavailable);
        };

        let (month, document) = {
            let mut state = self.state.lock().await;
            if state.loading {
                return Err(AppError::BadRequest(MSG_STILL_LOADING.to_string()));
            }
            if !state.loaded {
                warn!("Refusing to save {}: month was never loaded", state.form.month().doc_id());
                state.notify(NotificationKind::Warn, MSG_NOT_LOADED, self.clock.now());
                return Err(AppError::MonthNotLoaded);
            }
            (state.form.month(), state.form.to_document())
        };

        let path = DocumentPath::timesheet(&self.settings.app_id, user_id, &month)?;
        let fields = match serde_json::to_value(&document).map_err(StoreError::from)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(StoreError::MalformedDocument {
                    path: path.to_string(),
                }
                .into())
            }
        };

        match store.upsert_merge(&path, fields, &self.session_id).await {
            Ok(()) => {
                info!(
                    "Saved {} with {} filled day(s)",
                    path,
                    document.time_entries.len()
                );
                self.notify(NotificationKind::Success, MSG_SAVED).await;
                Ok(())
            }
            Err(e) => {
                error!("Failed to save {}: {}", path, e);
                self.notify(NotificationKind::Error, MSG_SAVE_FAILED).await;
                Err(e.into())
            }
        }
    }

    // --- Export ---

    async fn snapshot_for_export(&self) -> (TimesheetHeader, MonthKey, Vec<DayRecord>) {
        let state = self.state.lock().await;
        (
            state.form.header().clone(),
            state.form.month(),
            state.form.records().to_vec(),
        )
    }

    /// Renders the PDF report from the current form without changing it.
    pub async fn export_pdf(&self) -> Result<ExportFile, AppError> {
        let (header, month, records) = self.snapshot_for_export().await;

        let letterhead = match &self.settings.letterhead {
            Some(source) => match Letterhead::load(source).await {
                Ok(letterhead) => Some(letterhead),
                Err(e) => {
                    self.notify(NotificationKind::Error, MSG_PDF_FAILED).await;
                    return Err(e.into());
                }
            },
            None => None,
        };

        let input = ReportInput {
            header: &header,
            month,
            records: &records,
        };
        match render_pdf(&input, letterhead.as_ref()) {
            Ok(bytes) => {
                self.notify(NotificationKind::Success, MSG_PDF_DONE).await;
                Ok(ExportFile {
                    file_name: report_file_name(&header.server_name, month),
                    content_type: "application/pdf",
                    bytes,
                })
            }
            Err(e) => {
                self.notify(NotificationKind::Error, MSG_PDF_FAILED).await;
                Err(e.into())
            }
        }
    }

    pub async fn export_csv(&self) -> Result<ExportFile, AppError> {
        let (header, month, records) = self.snapshot_for_export().await;
        let input = ReportInput {
            header: &header,
            month,
            records: &records,
        };
        let bytes = render_csv(&input)?;
        Ok(ExportFile {
            file_name: csv_file_name(&header.server_name, month),
            content_type: "text/csv; charset=utf-8",
            bytes,
        })
    }
}
