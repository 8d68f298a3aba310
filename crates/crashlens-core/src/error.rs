use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrashLensError {
    #[error("crash not found: {0}")]
    CrashNotFound(String),

    #[error("no RCA recorded for crash: {0}")]
    RcaNotFound(String),

    #[error("diff for crash {0} is empty")]
    EmptyDiff(String),

    #[error("invalid severity '{0}': expected low, medium, high, or critical")]
    InvalidSeverity(String),

    #[error("invalid crash status '{0}'")]
    InvalidStatus(String),

    #[error("invalid chunk type '{0}'")]
    InvalidChunkKind(String),

    #[error("invalid investigation seed: {0}")]
    InvalidSeed(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("corrupt column '{column}' for crash {crash_id}: {reason}")]
    CorruptRow {
        crash_id: String,
        column: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrashLensError>;
