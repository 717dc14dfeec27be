use std::fmt;

/// Errors surfaced to the person operating the form.
///
/// None of these are fatal: every variant is reported back synchronously and
/// the user may retry the action right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// One or more required canonical columns could not be resolved from the
    /// header row. The read fails as a whole.
    Schema { missing: Vec<&'static str> },
    /// A call to the row store failed. `operation` names the call.
    Io {
        operation: &'static str,
        detail: String,
    },
    /// A decrease was requested for a (site, part) pair the ledger doesn't hold.
    NotFound { site: String, part: String },
    /// Input rejected before any remote call was made.
    Validation(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn io(operation: &'static str, detail: impl fmt::Display) -> Self {
        Self::Io {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-readable tag, used by the web layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::Io { .. } => "io",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { missing } => {
                write!(f, "missing required column(s): {}", missing.join(", "))
            }
            Self::Io { operation, detail } => write!(f, "{operation} failed: {detail}"),
            Self::NotFound { site, part } => {
                write!(f, "no stock entry for site {site:?}, part {part:?}")
            }
            Self::Validation(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl std::error::Error for LedgerError {}
