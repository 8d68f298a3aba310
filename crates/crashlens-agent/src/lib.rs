//! `crashlens-agent`: the agentic crash investigation loop.
//!
//! A reasoning model is seeded with a crash's stack trace and drives a
//! closed set of tools until it has saved a root-cause analysis (and,
//! ideally, a fix as a unified diff) for that crash.
//!
//! # Architecture
//!
//! ```text
//! InvestigationSeed
//!     │
//!     ▼
//! Investigator     ← turn loop: budget, deadline, cancellation
//!     │  ▲
//!     ▼  │
//! ReasoningModel   ← AnthropicModel over the Messages API
//!     │
//!     ▼
//! Toolbox          ← search_code, fetch_file, search_documents,
//!     │              save_rca, save_diff
//!     ▼
//! Backends         ← CodeIndex, DocumentIndex, FileAccessor, RcaStore
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use crashlens_agent::{Backends, Investigator, InvestigationConfig, Toolbox};
//! use tokio_util::sync::CancellationToken;
//!
//! let toolbox = Arc::new(Toolbox::new(backends));
//! let investigator = Investigator::new(model, toolbox, InvestigationConfig::default());
//! let report = investigator.investigate(&seed, CancellationToken::new()).await?;
//! println!("{}: {}", report.crash_id, report.status);
//! ```

pub mod anthropic;
pub mod backends;
pub mod error;
pub mod investigation;
pub mod model;
pub mod prompt;
pub mod tools;
pub mod transcript;

#[cfg(test)]
mod tests;

pub use anthropic::AnthropicModel;
pub use backends::{
    BackendError, CodeIndex, DocumentIndex, FileAccessor, FileRead, HttpCodeIndex,
    HttpDocumentIndex, LocalFileAccessor, NoCodeIndex, NoDocumentIndex,
};
pub use error::AgentError;
pub use investigation::{
    IncompleteReason, InvestigationConfig, InvestigationReport, InvestigationStatus, Investigator,
};
pub use model::{ModelRequest, ModelTurn, ReasoningModel, StopReason, TokenUsage, ToolDefinition};
pub use tools::{Backends, RcaTool, ToolContext, ToolName, ToolOutput, Toolbox};
pub use transcript::{ContentBlock, Message, Role, Transcript};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
