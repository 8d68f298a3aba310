use super::{clamp_top_k, parse_args, RcaTool, ToolContext, ToolName, ToolOutput};
use crate::AgentError;
use async_trait::async_trait;
use crashlens_core::chunk::CodeHit;
use serde::Deserialize;

pub struct SearchCodeTool;

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    top_k: Option<i64>,
}

#[async_trait]
impl RcaTool for SearchCodeTool {
    fn name(&self) -> ToolName {
        ToolName::SearchCode
    }

    fn description(&self) -> &'static str {
        "Search the semantic code index (AST chunks: functions, classes, imports) for code \
         related to the crash. Phrase queries around the error, the failing functions and \
         classes, or stack-trace context. Ask again with different wording or a larger top_k \
         when results are insufficient."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language or identifier query"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of chunks to return (default 5)"
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
            return Ok(ToolOutput::error("search_code: query must not be empty"));
        }
        let top_k = clamp_top_k(args.top_k, ctx.max_top_k);

        let chunks = match ctx.backends.code_index.search(query, top_k).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolOutput::error(format!("code index unavailable: {e}"))),
        };
        if chunks.is_empty() {
            return Ok(ToolOutput::ok(format!(
                "no matching code chunks for query '{query}'"
            )));
        }

        let hits: Vec<CodeHit> = chunks.into_iter().map(CodeHit::from).collect();
        Ok(ToolOutput::ok(serde_json::to_string_pretty(&hits)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{backends, chunk, StubCodeIndex, StubDocuments, StubFiles};
    use crashlens_core::store::RcaStore;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx_with(code: StubCodeIndex) -> ToolContext {
        ToolContext::new(
            "C1",
            20,
            backends(
                code,
                StubDocuments::default(),
                StubFiles::default(),
                RcaStore::open_in_memory().unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn returns_hits_with_location() {
        let ctx = ctx_with(StubCodeIndex {
            chunks: vec![chunk("backend/core/paystack.py", "initialize_payment", 30)],
            ..Default::default()
        });
        let out = SearchCodeTool
            .call(json!({"query": "paystack timeout"}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        let hits: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(hits[0]["file_path"], "backend/core/paystack.py");
        assert_eq!(hits[0]["line_start"], 30);
        assert_eq!(hits[0]["type"], "function");
    }

    #[tokio::test]
    async fn non_positive_top_k_is_clamped_to_one() {
        let code = Arc::new(StubCodeIndex {
            chunks: vec![chunk("a.py", "f", 1), chunk("b.py", "g", 1)],
            ..Default::default()
        });
        let mut b = backends(
            StubCodeIndex::default(),
            StubDocuments::default(),
            StubFiles::default(),
            RcaStore::open_in_memory().unwrap(),
        );
        b.code_index = code.clone();
        let ctx = ToolContext::new("C1", 20, b);

        for k in [0, -4] {
            let out = SearchCodeTool
                .call(json!({"query": "f", "top_k": k}), &ctx)
                .await
                .unwrap();
            let hits: Vec<serde_json::Value> = serde_json::from_str(&out.content).unwrap();
            assert_eq!(hits.len(), 1);
        }
        SearchCodeTool
            .call(json!({"query": "f", "top_k": 1000}), &ctx)
            .await
            .unwrap();
        assert_eq!(*code.seen_top_k.lock().unwrap(), vec![1, 1, 20]);
    }

    #[tokio::test]
    async fn empty_index_is_reported_not_fabricated() {
        let ctx = ctx_with(StubCodeIndex::default());
        let out = SearchCodeTool
            .call(json!({"query": "anything"}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        assert!(out.content.starts_with("no matching code chunks"));
    }

    #[tokio::test]
    async fn backend_failure_is_in_band() {
        let ctx = ctx_with(StubCodeIndex {
            fail: true,
            ..Default::default()
        });
        let out = SearchCodeTool.call(json!({"query": "x"}), &ctx).await.unwrap();
        assert!(out.is_error);
        assert!(out.content.starts_with("code index unavailable"));
    }

    #[tokio::test]
    async fn blank_or_missing_query_is_rejected() {
        let ctx = ctx_with(StubCodeIndex::default());
        let out = SearchCodeTool.call(json!({"query": "  "}), &ctx).await.unwrap();
        assert!(out.is_error);
        let out = SearchCodeTool.call(json!({"top_k": 3}), &ctx).await.unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("invalid arguments for search_code"));
    }
}
