//! Per-user panel sessions.
//!
//! A [`PanelSession`] is the context every panel operation runs against: the
//! open worksheet, the cached table and the notices waiting to be shown.
//! Mutations are applied to a copy of the cached table, written to the sheet
//! in full and then read back, so the cache is always replaced wholesale.
//! Failures never escape: they become notices and the cache falls back to an
//! empty table (read failure) or stays as it was (write failure).

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{self, SESSION_DURATION};
use crate::error::{PanelError, Result, Severity};
use crate::sheets::{SheetService, Worksheet};
use crate::table::Table;
use crate::transfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

impl From<Severity> for NoticeKind {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => NoticeKind::Warning,
            Severity::Error => NoticeKind::Error,
        }
    }
}

/// A message for the user, shown once on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

pub struct PanelSession<W> {
    identifier: Option<String>,
    worksheet: Option<W>,
    table: Table,
    loaded_at: Option<DateTime<Local>>,
    notices: Vec<Notice>,
}

impl<W> Default for PanelSession<W> {
    fn default() -> Self {
        PanelSession {
            identifier: None,
            worksheet: None,
            table: Table::default(),
            loaded_at: None,
            notices: Vec::new(),
        }
    }
}

impl<W: Worksheet> PanelSession<W> {
    pub fn new() -> Self {
        PanelSession::default()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.worksheet.is_some()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn loaded_at(&self) -> Option<DateTime<Local>> {
        self.loaded_at
    }

    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            text: text.into(),
        });
    }

    /// Notices accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn report(&mut self, err: PanelError) {
        match err.severity() {
            Severity::Error => log::error!("{}", err),
            Severity::Warning => log::warn!("{}", err),
        }
        self.notify(err.severity().into(), err.to_string());
    }

    fn set_table(&mut self, table: Table) {
        self.table = table;
        self.loaded_at = Some(Local::now());
    }

    /// Point the session at a spreadsheet and load its first worksheet.
    ///
    /// Re-opening the identifier that is already open keeps the cached table.
    /// Any other identifier drops the cache before the new one is loaded.
    ///
    /// # Arguments
    /// * `service` - Backend that resolves identifiers to worksheets
    /// * `input` - Spreadsheet ID or document URL as typed by the user
    ///
    /// Failures are not returned: they are logged and queued as notices.
    pub async fn open<S>(&mut self, service: &S, input: &str)
    where
        S: SheetService<Sheet = W>,
    {
        let Some(identifier) = config::spreadsheet_id(input) else {
            self.notify(NoticeKind::Info, PanelError::NoSheetOpen.to_string());
            return;
        };
        if self.is_open() && self.identifier.as_deref() == Some(identifier.as_str()) {
            return;
        }

        self.identifier = None;
        self.worksheet = None;
        self.table = Table::default();
        self.loaded_at = None;

        let worksheet = match service.open(&identifier).await {
            Ok(worksheet) => worksheet,
            Err(err) => return self.report(err),
        };
        let loaded = transfer::load(&worksheet).await;

        self.identifier = Some(identifier);
        self.worksheet = Some(worksheet);
        match loaded {
            Ok(table) => self.set_table(table),
            Err(err) => {
                self.set_table(Table::default());
                self.report(err);
            }
        }
    }

    /// Append a record built from one value per column.
    pub async fn add(&mut self, fields: &HashMap<String, String>) {
        let mut updated = self.table.clone();
        updated.push_record(fields);
        self.commit_or_report(Ok(updated)).await;
    }

    /// Set one cell. An empty value is refused with a warning.
    ///
    /// # Arguments
    /// * `index` - Position of the record in the cached table
    /// * `column` - Column name
    /// * `value` - New cell text
    pub async fn edit(&mut self, index: usize, column: &str, value: &str) {
        let mut updated = self.table.clone();
        let result = updated.set_cell(index, column, value).map(|_| updated);
        self.commit_or_report(result).await;
    }

    /// Remove the record at `index`.
    pub async fn delete(&mut self, index: usize) {
        let mut updated = self.table.clone();
        let result = updated.remove_record(index).map(|_| updated);
        self.commit_or_report(result).await;
    }

    async fn commit_or_report(&mut self, updated: Result<Table>) {
        let outcome = match updated {
            Ok(table) => self.commit(table).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            self.report(err);
        }
    }

    /// Write `updated` to the sheet and replace the cache with what was read back.
    ///
    /// A table without columns is the read-failure fallback and is never written.
    async fn commit(&mut self, updated: Table) -> Result<()> {
        let worksheet = self.worksheet.as_ref().ok_or(PanelError::NoSheetOpen)?;
        if updated.columns.is_empty() {
            return Err(PanelError::NoColumns);
        }

        transfer::save(worksheet, &updated).await?;
        let reloaded = transfer::load(worksheet).await;

        self.notify(NoticeKind::Success, "Changes saved.");
        match reloaded {
            Ok(table) => {
                self.set_table(table);
                Ok(())
            }
            Err(err) => {
                self.set_table(Table::default());
                Err(err)
            }
        }
    }
}

pub type SessionHandle<W> = Arc<Mutex<PanelSession<W>>>;

struct SessionEntry<W> {
    expires_at: SystemTime,
    session: SessionHandle<W>,
}

/// Sessions keyed by the id stored in the browser cookie.
pub struct SessionStore<W> {
    sessions: RwLock<HashMap<String, SessionEntry<W>>>,
    lifetime: Duration,
}

impl<W: Worksheet> Default for SessionStore<W> {
    fn default() -> Self {
        SessionStore::with_lifetime(Duration::from_secs(SESSION_DURATION))
    }
}

impl<W: Worksheet> SessionStore<W> {
    pub fn new() -> Self {
        SessionStore::default()
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Look up a live session.
    pub fn get(&self, session_id: &str) -> Option<SessionHandle<W>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|entry| entry.expires_at > SystemTime::now())
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Start a fresh session and return its id.
    pub fn create(&self) -> (String, SessionHandle<W>) {
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(PanelSession::new()));
        let now = SystemTime::now();

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                expires_at: now + self.lifetime,
                session: Arc::clone(&session),
            },
        );
        log::debug!("created session {}", session_id);

        (session_id, session)
    }

    /// The session named by the cookie, or a new one if it is missing or expired.
    pub fn get_or_create(&self, session_id: Option<&str>) -> (String, SessionHandle<W>) {
        if let Some(id) = session_id {
            if let Some(session) = self.get(id) {
                return (id.to_string(), session);
            }
        }
        self.create()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
