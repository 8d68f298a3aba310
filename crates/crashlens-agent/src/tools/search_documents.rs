use super::{clamp_top_k, parse_args, RcaTool, ToolContext, ToolName, ToolOutput};
use crate::AgentError;
use async_trait::async_trait;
use serde::Deserialize;

pub struct SearchDocumentsTool;

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    top_k: Option<i64>,
}

#[async_trait]
impl RcaTool for SearchDocumentsTool {
    fn name(&self) -> ToolName {
        ToolName::SearchDocuments
    }

    fn description(&self) -> &'static str {
        "Search the project's design and specification documents. Returns ranked references \
         (with excerpts when available) that can back up the analysis and be cited as \
         supporting documents."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the documentation"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of references to return (default 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, AgentError> {
        let args: Args = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(out) => return Ok(out),
        };
        let query = args.query.trim();
        if query.is_empty() {
            return Ok(ToolOutput::error("search_documents: query must not be empty"));
        }
        let top_k = clamp_top_k(args.top_k, ctx.max_top_k);

        match ctx.backends.documents.search(query, top_k).await {
            Ok(hits) if hits.is_empty() => Ok(ToolOutput::ok(format!(
                "no matching documents for query '{query}'"
            ))),
            Ok(hits) => Ok(ToolOutput::ok(serde_json::to_string_pretty(&hits)?)),
            Err(e) => Ok(ToolOutput::error(format!("document index unavailable: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::NoDocumentIndex;
    use crate::tools::testing::{backends, empty_backends, StubCodeIndex, StubDocuments, StubFiles};
    use crashlens_core::chunk::DocumentHit;
    use crashlens_core::store::RcaStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_references() {
        let docs = StubDocuments {
            hits: vec![DocumentHit {
                reference: "https://docs.example.com/payments#timeouts".into(),
                text: Some("Gateway calls must tolerate 30s latency.".into()),
                score: Some(0.8),
            }],
        };
        let ctx = ToolContext::new(
            "C1",
            20,
            backends(
                StubCodeIndex::default(),
                docs,
                StubFiles::default(),
                RcaStore::open_in_memory().unwrap(),
            ),
        );
        let out = SearchDocumentsTool
            .call(json!({"query": "gateway timeout", "top_k": 0}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        assert!(out.content.contains("payments#timeouts"));
    }

    #[tokio::test]
    async fn unconfigured_corpus_is_in_band() {
        let mut b = empty_backends();
        b.documents = Arc::new(NoDocumentIndex);
        let ctx = ToolContext::new("C1", 20, b);
        let out = SearchDocumentsTool
            .call(json!({"query": "refunds"}), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("not configured"));
    }

    #[tokio::test]
    async fn no_results_is_a_plain_note() {
        let ctx = ToolContext::new("C1", 20, empty_backends());
        let out = SearchDocumentsTool
            .call(json!({"query": "refunds"}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        assert!(out.content.starts_with("no matching documents"));
    }
}
