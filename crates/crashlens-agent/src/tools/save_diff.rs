use super::{parse_args, RcaTool, ToolContext, ToolName, ToolOutput};
use crate::AgentError;
use async_trait::async_trait;
use crashlens_core::diff::{looks_like_unified_diff, touched_paths};
use serde::Deserialize;

pub struct SaveDiffTool;

#[derive(Deserialize)]
struct Args {
    crash_id: String,
    diff: String,
}

#[async_trait]
impl RcaTool for SaveDiffTool {
    fn name(&self) -> ToolName {
        ToolName::SaveDiff
    }

    fn description(&self) -> &'static str {
        "Save a unified diff (git diff format) that fixes the crash. Only files read with \
         fetch_file in an earlier turn of this investigation may be changed. Keep the diff minimal."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "crash_id": {
                    "type": "string",
                    "description": "The crash id given in the investigation request"
                },
                "diff": {
                    "type": "string",
                    "description": "Unified diff with ---/+++ file headers and @@ hunks"
                }
            },
            "required": ["crash_id", "diff"]
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
        if let Some(rejected) = ctx.check_crash_id(self.name(), &args.crash_id) {
            return Ok(rejected);
        }
        if !looks_like_unified_diff(&args.diff) {
            return Ok(ToolOutput::error(
                "save_diff: not a unified diff (expected ---/+++ or diff --git headers and @@ hunks)",
            ));
        }

        let seen = ctx.ledger().seen;
        let unverified: Vec<String> = touched_paths(&args.diff)
            .into_iter()
            .filter(|p| !seen.contains(p))
            .collect();
        if !unverified.is_empty() {
            return Ok(ToolOutput::error(format!(
                "save_diff: the diff changes files that were not read in an earlier turn of this investigation: {}. \
                 Read them with fetch_file and review the content before saving a diff.",
                unverified.join(", ")
            )));
        }

        let store = ctx.backends.store.clone();
        let crash_id = ctx.crash_id.clone();
        let diff = args.diff;
        let rca = tokio::task::spawn_blocking(move || store.append_diff(&crash_id, &diff)).await??;
        ctx.mark_diff_saved();
        tracing::info!(crash_id = %rca.crash_id, rca_id = %rca.id, "diff saved");

        Ok(ToolOutput::ok(
            serde_json::json!({
                "status": "saved",
                "rca_id": rca.id,
                "crash_id": rca.crash_id,
                "can_create_pr": rca.can_create_pr(),
            })
            .to_string(),
        ))
    }
}
