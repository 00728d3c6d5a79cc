use thiserror::Error;

/// How a failure is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Every failure the panel can report.
///
/// The first four variants are backend failures, caught where they occur and
/// shown as errors. The rest are input-policy violations, shown as warnings and
/// never reaching the spreadsheet.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The credential file is missing, malformed, or was rejected by the token endpoint.
    #[error("authentication error: {0}")]
    Credentials(String),

    /// The spreadsheet identifier is wrong or the service account lacks access.
    #[error("could not access the spreadsheet: {0}")]
    DocumentAccess(String),

    /// The worksheet could not be read.
    #[error("error reading the sheet: {0}")]
    Read(String),

    /// Clearing or writing the worksheet failed.
    #[error("error saving: {0}")]
    Write(String),

    #[error("enter a new value before updating")]
    EmptyValue,

    #[error("row {index} does not exist (the table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("enter the spreadsheet ID to continue")]
    NoSheetOpen,

    /// The cached table has no header row, so there is nothing safe to write back.
    #[error("the sheet has no columns loaded; open it again before making changes")]
    NoColumns,
}

impl PanelError {
    pub fn severity(&self) -> Severity {
        match self {
            PanelError::Credentials(_)
            | PanelError::DocumentAccess(_)
            | PanelError::Read(_)
            | PanelError::Write(_) => Severity::Error,
            PanelError::EmptyValue
            | PanelError::RowOutOfRange { .. }
            | PanelError::UnknownColumn(_)
            | PanelError::NoSheetOpen
            | PanelError::NoColumns => Severity::Warning,
        }
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;
