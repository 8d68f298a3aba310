//! The investigation's closed tool set.
//!
//! Every handler decodes its own typed arguments and answers with a
//! [`ToolOutput`]. Recoverable problems (bad arguments, empty search results,
//! missing files, unavailable indexes) are reported to the model in-band so
//! it can adapt; only persistence failures escape as [`AgentError`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use crashlens_core::diff::normalize_repo_path;
use crashlens_core::store::RcaStore;

use crate::backends::{CodeIndex, DocumentIndex, FileAccessor};
use crate::model::ToolDefinition;
use crate::transcript::{ToolCall, ToolResult};
use crate::AgentError;

pub mod fetch_file;
pub mod save_diff;
pub mod save_rca;
pub mod search_code;
pub mod search_documents;

pub const DEFAULT_TOP_K: i64 = 5;

// ─── ToolName ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    SearchCode,
    FetchFile,
    SearchDocuments,
    SaveRca,
    SaveDiff,
}

impl ToolName {
    pub fn all() -> &'static [ToolName] {
        &[
            ToolName::SearchCode,
            ToolName::FetchFile,
            ToolName::SearchDocuments,
            ToolName::SaveRca,
            ToolName::SaveDiff,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SearchCode => "search_code",
            ToolName::FetchFile => "fetch_file",
            ToolName::SearchDocuments => "search_documents",
            ToolName::SaveRca => "save_rca",
            ToolName::SaveDiff => "save_diff",
        }
    }

    pub fn parse(s: &str) -> Option<ToolName> {
        ToolName::all().iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── ToolOutput ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Decode tool arguments, or an in-band error naming the tool.
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool: ToolName,
    args: serde_json::Value,
) -> Result<T, ToolOutput> {
    serde_json::from_value(args)
        .map_err(|e| ToolOutput::error(format!("invalid arguments for {tool}: {e}")))
}

/// Clamp a requested result count into `[1, max_top_k]`.
pub(crate) fn clamp_top_k(requested: Option<i64>, max_top_k: u32) -> u32 {
    let max = i64::from(max_top_k.max(1));
    requested.unwrap_or(DEFAULT_TOP_K).clamp(1, max) as u32
}

// ─── Backends / ToolContext ───────────────────────────────────────────────

/// Shared collaborators, injected once and reused by every investigation.
#[derive(Clone)]
pub struct Backends {
    pub code_index: Arc<dyn CodeIndex>,
    pub documents: Arc<dyn DocumentIndex>,
    pub files: Arc<dyn FileAccessor>,
    pub store: RcaStore,
}

/// What one investigation has done so far, as seen by the tools.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Normalized paths of every successful `fetch_file`.
    pub fetched: BTreeSet<String>,
    /// Fetched paths whose content reached the model in an earlier turn.
    /// `save_diff` only accepts changes to these.
    pub seen: BTreeSet<String>,
    pub rca_saved: bool,
    pub diff_saved: bool,
}

/// Per-investigation state handed to every tool call.
pub struct ToolContext {
    pub crash_id: String,
    pub max_top_k: u32,
    pub backends: Backends,
    ledger: Mutex<Ledger>,
}

impl ToolContext {
    pub fn new(crash_id: impl Into<String>, max_top_k: u32, backends: Backends) -> Self {
        Self {
            crash_id: crash_id.into(),
            max_top_k,
            backends,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    fn with_ledger<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        let mut guard = self.ledger.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn ledger(&self) -> Ledger {
        self.with_ledger(|l| l.clone())
    }

    pub(crate) fn record_fetch(&self, path: &str) {
        let path = normalize_repo_path(path);
        self.with_ledger(|l| {
            l.fetched.insert(path);
        });
    }

    /// Called before a turn's tool calls run: everything fetched so far has
    /// now been returned to the model.
    pub fn begin_turn(&self) {
        self.with_ledger(|l| l.seen.clone_from(&l.fetched));
    }

    pub(crate) fn mark_rca_saved(&self) {
        self.with_ledger(|l| l.rca_saved = true);
    }

    pub(crate) fn mark_diff_saved(&self) {
        self.with_ledger(|l| l.diff_saved = true);
    }

    /// In-band rejection when a persistence call names another crash.
    pub(crate) fn check_crash_id(&self, tool: ToolName, crash_id: &str) -> Option<ToolOutput> {
        if crash_id.trim() == self.crash_id {
            None
        } else {
            Some(ToolOutput::error(format!(
                "{tool}: crash_id '{crash_id}' does not match the crash under investigation ('{}')",
                self.crash_id
            )))
        }
    }
}

// ─── RcaTool ──────────────────────────────────────────────────────────────

#[async_trait]
pub trait RcaTool: Send + Sync {
    fn name(&self) -> ToolName;
    fn description(&self) -> &'static str;
    fn schema(&self) -> serde_json::Value;
    async fn call(
        &self,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, AgentError>;
}

pub fn all_tools() -> Vec<Box<dyn RcaTool>> {
    vec![
        Box::new(search_code::SearchCodeTool),
        Box::new(fetch_file::FetchFileTool),
        Box::new(search_documents::SearchDocumentsTool),
        Box::new(save_rca::SaveRcaTool),
        Box::new(save_diff::SaveDiffTool),
    ]
}

// ─── Toolbox ──────────────────────────────────────────────────────────────

/// Lookup table from tool name to handler, plus the backends they use.
pub struct Toolbox {
    tools: HashMap<ToolName, Box<dyn RcaTool>>,
    backends: Backends,
}

impl Toolbox {
    pub fn new(backends: Backends) -> Self {
        let tools = all_tools().into_iter().map(|t| (t.name(), t)).collect();
        Self { tools, backends }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn context(&self, crash_id: &str, max_top_k: u32) -> ToolContext {
        ToolContext::new(crash_id, max_top_k, self.backends.clone())
    }

    /// Tool definitions advertised to the model, in a stable order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names: Vec<&ToolName> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| ToolDefinition {
                name: t.name().as_str().to_string(),
                description: t.description().to_string(),
                input_schema: t.schema(),
            })
            .collect()
    }

    /// Run one tool call. Unknown names and bad arguments come back as
    /// error results; only infrastructure failures are `Err`.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<ToolResult, AgentError> {
        let output = match ToolName::parse(&call.name).and_then(|n| self.tools.get(&n)) {
            Some(tool) => tool.call(call.input.clone(), ctx).await?,
            None => {
                let known: Vec<&str> = ToolName::all().iter().map(|t| t.as_str()).collect();
                ToolOutput::error(format!(
                    "unknown tool '{}'; available tools: {}",
                    call.name,
                    known.join(", ")
                ))
            }
        };

        if output.is_error {
            tracing::warn!(tool = %call.name, crash_id = %ctx.crash_id, error = %output.content, "tool call failed");
        } else {
            tracing::info!(tool = %call.name, crash_id = %ctx.crash_id, bytes = output.content.len(), "tool call");
        }

        Ok(ToolResult {
            tool_use_id: call.id.clone(),
            content: output.content,
            is_error: output.is_error,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_names_round_trip() {
        for name in ToolName::all() {
            assert_eq!(ToolName::parse(name.as_str()), Some(*name));
        }
        assert_eq!(ToolName::parse("get_data_from_embeddings"), None);
    }

    #[test]
    fn clamp_top_k_bounds() {
        assert_eq!(clamp_top_k(None, 20), 5);
        assert_eq!(clamp_top_k(Some(0), 20), 1);
        assert_eq!(clamp_top_k(Some(-3), 20), 1);
        assert_eq!(clamp_top_k(Some(500), 20), 20);
        assert_eq!(clamp_top_k(Some(7), 0), 1);
    }

    #[test]
    fn definitions_cover_every_tool_in_order() {
        let toolbox = Toolbox::new(testing::empty_backends());
        let names: Vec<String> = toolbox.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            ["search_code", "fetch_file", "search_documents", "save_rca", "save_diff"]
        );
        for def in toolbox.definitions() {
            assert_eq!(def.input_schema["type"], "object");
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_an_in_band_error() {
        let toolbox = Toolbox::new(testing::empty_backends());
        let ctx = toolbox.context("C1", 20);
        let result = toolbox
            .dispatch(
                &ToolCall {
                    id: "tu_9".into(),
                    name: "delete_repository".into(),
                    input: json!({}),
                },
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.tool_use_id, "tu_9");
        assert!(result.content.contains("unknown tool"));
    }

    #[test]
    fn crash_id_mismatch_is_rejected() {
        let ctx = ToolContext::new("C1", 20, testing::empty_backends());
        assert!(ctx.check_crash_id(ToolName::SaveRca, "C1").is_none());
        let out = ctx.check_crash_id(ToolName::SaveRca, "C2").unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("C2"));
    }
}
