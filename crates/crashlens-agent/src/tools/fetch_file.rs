use super::{parse_args, RcaTool, ToolContext, ToolName, ToolOutput};
use crate::backends::FileRead;
use crate::AgentError;
use async_trait::async_trait;
use serde::Deserialize;

/// Files larger than this are cut off so one read cannot swamp the transcript.
const MAX_FILE_BYTES: usize = 256 * 1024;

pub struct FetchFileTool;

#[derive(Deserialize)]
struct Args {
    path: String,
}

#[async_trait]
impl RcaTool for FetchFileTool {
    fn name(&self) -> ToolName {
        ToolName::FetchFile
    }

    fn description(&self) -> &'static str {
        "Read the full content of a repository file, using the file_path reported by \
         search_code or a path from the stack trace. Read every file you intend to change \
         before proposing a diff."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Repository-relative file path"
                }
            },
            "required": ["path"]
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

        match ctx.backends.files.read(&args.path).await {
            FileRead::Content(body) => {
                ctx.record_fetch(&ctx.backends.files.repo_path(&args.path));
                Ok(ToolOutput::ok(truncate(body)))
            }
            FileRead::NotFound => Ok(ToolOutput::error("file not found")),
            FileRead::Error(reason) => Ok(ToolOutput::error(format!("error reading file: {reason}"))),
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() <= MAX_FILE_BYTES {
        return body;
    }
    let total = body.len();
    let mut cut = MAX_FILE_BYTES;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str(&format!("\n... [truncated: showing {cut} of {total} bytes]"));
    body
}
