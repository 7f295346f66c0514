use std::fmt;
use std::path::PathBuf;

use crate::order::OrderError;

/// Machine-readable error codes for clients that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    NotFound,
    Forbidden,
    InvalidPosition,
    InvalidInput,
    Conflict,
    PersistenceFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::Forbidden => "E2002",
            Self::InvalidPosition => "E2003",
            Self::InvalidInput => "E2004",
            Self::Conflict => "E5001",
            Self::PersistenceFailure => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Board store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "Not found",
            Self::Forbidden => "Not authorized for this board",
            Self::InvalidPosition => "Invalid position",
            Self::InvalidInput => "Invalid input",
            Self::Conflict => "Concurrent modification",
            Self::PersistenceFailure => "Storage failure",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tk init` to create the board store."),
            Self::ConfigParseError => Some("Fix syntax in .tack/config.toml and retry."),
            Self::NotFound => None,
            Self::Forbidden => Some("Only the board owner can change its lists and cards."),
            Self::InvalidPosition => {
                Some("Positions are zero-based; a move may target at most the item count.")
            }
            Self::InvalidInput => None,
            Self::Conflict => Some("Reload the board and retry the operation."),
            Self::PersistenceFailure => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Why a write was refused as conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Another writer held the database lock past the busy timeout.
    Busy,
    /// The caller's view of the container is out of date.
    StaleVersion { expected: i64, actual: i64 },
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("store is busy with another writer"),
            Self::StaleVersion { expected, actual } => {
                write!(f, "expected version {expected}, found {actual}")
            }
        }
    }
}

/// Errors surfaced by the store and services.
#[derive(Debug, thiserror::Error)]
pub enum TackError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("user '{user}' may not modify board {board}")]
    Forbidden { user: String, board: String },

    #[error("position {requested} is out of range (allowed 0..={max})")]
    PositionOutOfRange { requested: i64, max: usize },

    #[error("position {position} is claimed by more than one item")]
    PositionClaimedTwice { position: usize },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("conflict on {container}: {reason}")]
    Conflict {
        container: String,
        reason: ConflictReason,
    },

    #[error("storage failure: {0}")]
    Persistence(#[source] rusqlite::Error),

    #[error("failed to load config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("board store not initialized at {}", path.display())]
    NotInitialized { path: PathBuf },
}

impl TackError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::PositionOutOfRange { .. } | Self::PositionClaimedTwice { .. } => {
                ErrorCode::InvalidPosition
            }
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Persistence(_) => ErrorCode::PersistenceFailure,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
        }
    }

    /// Remediation hint, falling back to a generic message.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .unwrap_or_else(|| self.error_code().message())
            .to_string()
    }

    /// True when re-running the operation with fresh reads may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict {
                reason: ConflictReason::Busy,
                ..
            }
        )
    }
}

impl From<OrderError> for TackError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::UnknownItem { item } => Self::NotFound {
                entity: "item in container",
                id: item,
            },
            OrderError::DuplicateItem { item } => Self::InvalidInput {
                field: "item",
                reason: format!("{item} already belongs to this container"),
            },
            OrderError::PositionOutOfRange { requested, max } => {
                Self::PositionOutOfRange { requested, max }
            }
            OrderError::PositionClaimedTwice { position } => {
                Self::PositionClaimedTwice { position }
            }
        }
    }
}

/// Lock contention becomes a retryable [`ConflictReason::Busy`]; every
/// other SQLite failure is a persistence error.
impl From<rusqlite::Error> for TackError {
    fn from(err: rusqlite::Error) -> Self {
        if is_busy(&err) {
            Self::Conflict {
                container: "store".into(),
                reason: ConflictReason::Busy,
            }
        } else {
            Self::Persistence(err)
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(
                inner.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

pub type Result<T, E = TackError> = std::result::Result<T, E>;
