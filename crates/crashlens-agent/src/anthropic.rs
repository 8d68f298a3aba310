//! Messages API client implementing [`ReasoningModel`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{ModelRequest, ModelTurn, ReasoningModel, StopReason, TokenUsage, ToolDefinition};
use crate::transcript::{ContentBlock, Message};
use crate::AgentError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct AnthropicModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }

    /// Build from a config section, reading the key from `api_key_env`.
    pub fn from_config(cfg: &crashlens_core::config::ModelConfig) -> Result<Self, AgentError> {
        let key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::MissingApiKey(cfg.api_key_env.clone()))?;
        Self::new(&cfg.base_url, key, &cfg.name, cfg.max_tokens)
    }
}

// ─── Wire shapes ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: TokenUsage,
}

/// Response blocks; anything other than text and tool_use (thinking,
/// server tools) is dropped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[async_trait]
impl ReasoningModel for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, request: &ModelRequest) -> Result<ModelTurn, AgentError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &request.system,
            messages: &request.messages,
            tools: &request.tools,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::ModelHttp {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::Model(format!("unparseable response: {e}")))?;
        tracing::debug!(
            model = %self.model,
            stop_reason = ?parsed.stop_reason,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "model turn"
        );

        let content = parsed
            .content
            .into_iter()
            .filter_map(|b| match b {
                ResponseBlock::Text { text } => Some(ContentBlock::Text { text }),
                ResponseBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ResponseBlock::Other => None,
            })
            .collect();

        Ok(ModelTurn {
            content,
            stop_reason: StopReason::from_wire(parsed.stop_reason.as_deref()),
            usage: parsed.usage,
        })
    }
}
