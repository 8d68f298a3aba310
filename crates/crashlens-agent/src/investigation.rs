use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crashlens_core::config::InvestigationLimits;
use crashlens_core::seed::InvestigationSeed;

use crate::model::{ModelRequest, ReasoningModel, TokenUsage};
use crate::prompt::{self, SYSTEM_PROMPT};
use crate::tools::Toolbox;
use crate::transcript::Transcript;
use crate::AgentError;

// ─── InvestigationConfig ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct InvestigationConfig {
    /// Reasoning turns before the run stops as incomplete.
    pub max_turns: u32,
    /// Wall-clock budget for the whole investigation.
    pub timeout: Duration,
    pub max_top_k: u32,
    /// Replaces the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        InvestigationConfig::from(&InvestigationLimits::default())
    }
}

impl From<&InvestigationLimits> for InvestigationConfig {
    fn from(limits: &InvestigationLimits) -> Self {
        Self {
            max_turns: limits.max_turns,
            timeout: Duration::from_secs(limits.timeout_secs),
            max_top_k: limits.max_top_k,
            system_prompt: None,
        }
    }
}

// ─── InvestigationReport ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    TurnBudgetExhausted,
    TimedOut,
    /// The model stopped calling tools without ever saving an RCA.
    ConcludedWithoutRca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvestigationStatus {
    Completed,
    Incomplete { reason: IncompleteReason },
    Cancelled,
}

impl InvestigationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvestigationStatus::Completed => "completed",
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::TurnBudgetExhausted,
            } => "incomplete (turn budget exhausted)",
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::TimedOut,
            } => "incomplete (timed out)",
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::ConcludedWithoutRca,
            } => "incomplete (concluded without saving an RCA)",
            InvestigationStatus::Cancelled => "cancelled",
        }
    }

    fn incomplete(reason: IncompleteReason) -> Self {
        InvestigationStatus::Incomplete { reason }
    }
}

impl std::fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestigationReport {
    pub crash_id: String,
    #[serde(flatten)]
    pub status: InvestigationStatus,
    pub turns: u32,
    pub tool_calls: u32,
    pub rca_saved: bool,
    pub diff_saved: bool,
    pub can_create_pr: bool,
    /// The model's last text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
}

// ─── Investigator ─────────────────────────────────────────────────────────

/// Drives one reasoning model through the tool loop for a crash.
///
/// Holds no per-crash state, so one investigator can run many
/// investigations concurrently.
pub struct Investigator {
    model: Arc<dyn ReasoningModel>,
    toolbox: Arc<Toolbox>,
    config: InvestigationConfig,
}

impl Investigator {
    pub fn new(
        model: Arc<dyn ReasoningModel>,
        toolbox: Arc<Toolbox>,
        config: InvestigationConfig,
    ) -> Self {
        Self {
            model,
            toolbox,
            config,
        }
    }

    pub fn config(&self) -> &InvestigationConfig {
        &self.config
    }

    /// Investigate one crash until the model concludes, a budget runs out,
    /// or `cancel` fires.
    ///
    /// Cancellation and the deadline are checked between turns; a turn's
    /// tool calls always run to completion once started. Model or
    /// persistence failures abort with `Err`.
    pub async fn investigate(
        &self,
        seed: &InvestigationSeed,
        cancel: CancellationToken,
    ) -> Result<InvestigationReport, AgentError> {
        let span = tracing::info_span!(
            "investigation",
            crash_id = %seed.crash_id,
            repository_id = %seed.repository_id,
            model = %self.model.name()
        );
        self.run(seed, cancel).instrument(span).await
    }

    async fn run(
        &self,
        seed: &InvestigationSeed,
        cancel: CancellationToken,
    ) -> Result<InvestigationReport, AgentError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let ctx = self.toolbox.context(&seed.crash_id, self.config.max_top_k);
        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| SYSTEM_PROMPT.to_string());
        let tools = self.toolbox.definitions();

        let mut transcript = Transcript::new();
        transcript.push_seed(prompt::seed_message(seed));

        let mut turns: u32 = 0;
        let mut tool_calls: u32 = 0;
        let mut usage = TokenUsage::default();

        tracing::info!(max_turns = self.config.max_turns, timeout = ?self.config.timeout, "investigation started");

        let status = loop {
            if cancel.is_cancelled() {
                break InvestigationStatus::Cancelled;
            }
            if tokio::time::Instant::now() >= deadline {
                break InvestigationStatus::incomplete(IncompleteReason::TimedOut);
            }
            if turns >= self.config.max_turns {
                break InvestigationStatus::incomplete(IncompleteReason::TurnBudgetExhausted);
            }

            let request = ModelRequest {
                system: system.clone(),
                messages: transcript.messages().to_vec(),
                tools: tools.clone(),
            };

            let turn = tokio::select! {
                biased;
                _ = cancel.cancelled() => break InvestigationStatus::Cancelled,
                reply = tokio::time::timeout_at(deadline, self.model.respond(&request)) => match reply {
                    Ok(turn) => turn?,
                    Err(_) => break InvestigationStatus::incomplete(IncompleteReason::TimedOut),
                },
            };

            turns += 1;
            usage.add(turn.usage);
            let calls = turn.tool_calls();
            tracing::debug!(turn = turns, tool_calls = calls.len(), stop_reason = ?turn.stop_reason, "reasoning turn");
            transcript.push_model_turn(turn.content);

            if calls.is_empty() {
                break if ctx.ledger().rca_saved {
                    InvestigationStatus::Completed
                } else {
                    InvestigationStatus::incomplete(IncompleteReason::ConcludedWithoutRca)
                };
            }

            tool_calls += calls.len() as u32;
            ctx.begin_turn();
            let results = join_all(calls.iter().map(|call| self.toolbox.dispatch(call, &ctx)))
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            transcript.push_tool_results(results);
        };

        let ledger = ctx.ledger();
        let can_create_pr = if ledger.rca_saved || ledger.diff_saved {
            let store = self.toolbox.backends().store.clone();
            let crash_id = seed.crash_id.clone();
            tokio::task::spawn_blocking(move || store.get_rca(&crash_id))
                .await??
                .is_some_and(|rca| rca.can_create_pr())
        } else {
            false
        };

        let report = InvestigationReport {
            crash_id: seed.crash_id.clone(),
            status,
            turns,
            tool_calls,
            rca_saved: ledger.rca_saved,
            diff_saved: ledger.diff_saved,
            can_create_pr,
            final_text: transcript.final_text(),
            usage,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        match status {
            InvestigationStatus::Completed => tracing::info!(
                turns,
                tool_calls,
                diff_saved = report.diff_saved,
                "investigation completed"
            ),
            _ => tracing::warn!(
                turns,
                tool_calls,
                rca_saved = report.rca_saved,
                status = %status,
                "investigation ended early"
            ),
        }
        Ok(report)
    }
}
