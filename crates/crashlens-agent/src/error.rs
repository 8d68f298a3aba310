use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("reasoning model error: {0}")]
    Model(String),

    #[error("reasoning model returned HTTP {status}: {body}")]
    ModelHttp { status: u16, body: String },

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("persistence failure: {0}")]
    Store(#[from] crashlens_core::CrashLensError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tool task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
