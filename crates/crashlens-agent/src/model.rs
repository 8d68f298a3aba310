use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcript::{ContentBlock, Message, ToolCall};
use crate::AgentError;

// ─── Request ──────────────────────────────────────────────────────────────

/// A tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

// ─── Response ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            Some(other) => StopReason::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One reasoning turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ModelTurn {
    /// Tool calls requested in this turn, in the order the model emitted them.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

// ─── ReasoningModel ───────────────────────────────────────────────────────

/// The reasoning model behind the investigation loop.
///
/// Any `Err` is treated as non-retrievable: the investigation fails.
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(&self, request: &ModelRequest) -> Result<ModelTurn, AgentError>;
}
