use super::{parse_args, RcaTool, ToolContext, ToolName, ToolOutput};
use crate::AgentError;
use async_trait::async_trait;
use crashlens_core::rca::RcaFields;
use serde::Deserialize;

pub struct SaveRcaTool;

#[derive(Deserialize)]
struct Args {
    crash_id: String,
    description: String,
    problem_identification: String,
    data_collection: String,
    root_cause_identification: String,
    solution: String,
    #[serde(default)]
    supporting_documents: Vec<String>,
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[async_trait]
impl RcaTool for SaveRcaTool {
    fn name(&self) -> ToolName {
        ToolName::SaveRca
    }

    fn description(&self) -> &'static str {
        "Save the Root Cause Analysis for the crash under investigation. Call this once the \
         investigation has converged; calling it again updates the same record."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "crash_id": {
                    "type": "string",
                    "description": "The crash id given in the investigation request"
                },
                "description": {
                    "type": "string",
                    "description": "High-level description of the crash incident"
                },
                "problem_identification": {
                    "type": "string",
                    "description": "How the crash was identified, including symptoms and triggers"
                },
                "data_collection": {
                    "type": "string",
                    "description": "Evidence collected during the investigation (traces, code, documents)"
                },
                "root_cause_identification": {
                    "type": "string",
                    "description": "The underlying root cause of the crash"
                },
                "solution": {
                    "type": "string",
                    "description": "Proposed solution to resolve the issue and prevent recurrence"
                },
                "supporting_documents": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "References to supporting documents, if any"
                }
            },
            "required": [
                "crash_id",
                "description",
                "problem_identification",
                "data_collection",
                "root_cause_identification",
                "solution"
            ]
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
        if args.root_cause_identification.trim().is_empty() {
            return Ok(ToolOutput::error(
                "save_rca: root_cause_identification must not be empty",
            ));
        }

        let documents: Vec<String> = args
            .supporting_documents
            .into_iter()
            .filter(|d| !d.trim().is_empty())
            .collect();
        let fields = RcaFields {
            description: non_blank(args.description),
            problem_identification: non_blank(args.problem_identification),
            data_collection: non_blank(args.data_collection),
            root_cause_identification: non_blank(args.root_cause_identification),
            solution: non_blank(args.solution),
            supporting_documents: (!documents.is_empty()).then_some(documents),
            ..Default::default()
        };

        let store = ctx.backends.store.clone();
        let crash_id = ctx.crash_id.clone();
        let rca = tokio::task::spawn_blocking(move || store.upsert_rca(&crash_id, &fields)).await??;
        ctx.mark_rca_saved();
        tracing::info!(crash_id = %rca.crash_id, rca_id = %rca.id, "rca saved");

        Ok(ToolOutput::ok(
            serde_json::json!({
                "status": "saved",
                "rca_id": rca.id,
                "crash_id": rca.crash_id,
                "updated_at": rca.updated_at,
            })
            .to_string(),
        ))
    }
}
