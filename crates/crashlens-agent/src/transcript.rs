use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crashlens_core::diff::normalize_repo_path;

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content, in the Messages API wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool inputs vary per tool; each handler decodes its own shape.
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The outcome of one tool invocation, paired to its call by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

// ─── Transcript ───────────────────────────────────────────────────────────

/// Ordered conversation for one investigation. Lives only as long as the
/// loop that owns it.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_seed(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user_text(text));
    }

    pub fn push_model_turn(&mut self, content: Vec<ContentBlock>) {
        self.messages.push(Message {
            role: Role::Assistant,
            content,
        });
    }

    /// Append every result of one turn as a single user message, in the
    /// order given.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) {
        let content = results
            .into_iter()
            .map(|r| ContentBlock::ToolResult {
                tool_use_id: r.tool_use_id,
                content: r.content,
                is_error: r.is_error,
            })
            .collect();
        self.messages.push(Message {
            role: Role::User,
            content,
        });
    }

    /// Every tool call the model has made so far, oldest first.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.content.iter())
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

    /// Paths of `fetch_file` calls whose result was not an error.
    pub fn successful_fetches(&self) -> BTreeSet<String> {
        let failed: BTreeSet<&str> = self
            .messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    is_error: true,
                    ..
                } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        let answered: BTreeSet<&str> = self
            .messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();

        self.tool_calls()
            .into_iter()
            .filter(|c| c.name == "fetch_file")
            .filter(|c| answered.contains(c.id.as_str()) && !failed.contains(c.id.as_str()))
            .filter_map(|c| c.input.get("path")?.as_str().map(normalize_repo_path))
            .collect()
    }

    /// Text of the most recent assistant message.
    pub fn final_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(Message::text)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    fn result(id: &str, content: &str, is_error: bool) -> ToolResult {
        ToolResult {
            tool_use_id: id.into(),
            content: content.into(),
            is_error,
        }
    }

    #[test]
    fn content_block_uses_messages_api_shape() {
        let block = tool_use("tu_1", "search_code", json!({"query": "paystack"}));
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["type"], "tool_use");
        assert_eq!(v["input"]["query"], "paystack");

        let ok = ContentBlock::ToolResult {
            tool_use_id: "tu_1".into(),
            content: "[]".into(),
            is_error: false,
        };
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["type"], "tool_result");
        assert!(v.get("is_error").is_none());
    }

    #[test]
    fn tool_results_of_one_turn_form_one_message_in_order() {
        let mut t = Transcript::new();
        t.push_seed("trace");
        t.push_model_turn(vec![
            tool_use("a", "search_code", json!({})),
            tool_use("b", "fetch_file", json!({"path": "x.py"})),
        ]);
        t.push_tool_results(vec![result("a", "[]", false), result("b", "body", false)]);

        assert_eq!(t.len(), 3);
        let last = &t.messages()[2];
        assert_eq!(last.role, Role::User);
        let ids: Vec<&str> = last
            .content
            .iter()
            .map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(t.tool_calls().len(), 2);
    }

    #[test]
    fn successful_fetches_excludes_failed_reads() {
        let mut t = Transcript::new();
        t.push_model_turn(vec![
            tool_use("a", "fetch_file", json!({"path": "./app/payment.py"})),
            tool_use("b", "fetch_file", json!({"path": "app/missing.py"})),
        ]);
        t.push_tool_results(vec![
            result("a", "def pay(): ...", false),
            result("b", "file not found", true),
        ]);
        let fetched = t.successful_fetches();
        assert_eq!(fetched.len(), 1);
        assert!(fetched.contains("app/payment.py"));
    }

    #[test]
    fn final_text_reads_last_assistant_message() {
        let mut t = Transcript::new();
        t.push_seed("trace");
        assert_eq!(t.final_text(), None);
        t.push_model_turn(vec![ContentBlock::Text {
            text: "RCA saved.".into(),
        }]);
        assert_eq!(t.final_text().as_deref(), Some("RCA saved."));
    }
}
