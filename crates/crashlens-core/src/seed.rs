//! The free-text block an investigation is seeded with.
//!
//! A seed is a raw stack trace followed by literal `crash id:`,
//! `repository id:` and `repository url:` lines. The trace itself is opaque,
//! language-specific text and is always forwarded verbatim; the helpers here
//! only extract hints from it.

use crate::error::{CrashLensError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// InvestigationSeed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationSeed {
    pub stack_trace: String,
    pub crash_id: String,
    pub repository_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
}

impl InvestigationSeed {
    pub fn new(
        stack_trace: impl Into<String>,
        crash_id: impl Into<String>,
        repository_id: impl Into<String>,
        repository_url: Option<String>,
    ) -> Self {
        Self {
            stack_trace: stack_trace.into(),
            crash_id: crash_id.into(),
            repository_id: repository_id.into(),
            repository_url,
        }
    }

    /// Parse an unstructured seed block.
    ///
    /// Markers (`crash id:`, `repository id:`, `repository url:`) are found
    /// anywhere in a line, in any letter case. Each value runs to the next
    /// comma, the next marker, or the end of the line. Text before the first
    /// marker on a line, and every line without markers, is kept in order as
    /// the stack trace.
    pub fn parse(text: &str) -> Result<Self> {
        let mut crash_id = None;
        let mut repository_id = None;
        let mut repository_url = None;
        let mut trace_lines: Vec<&str> = Vec::new();

        for line in text.lines() {
            let markers: Vec<(usize, usize, String, String)> = marker_re()
                .captures_iter(line)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    Some((
                        whole.start(),
                        whole.end(),
                        caps[1].to_ascii_lowercase(),
                        caps[2].to_ascii_lowercase(),
                    ))
                })
                .collect();
            let Some(first) = markers.first() else {
                trace_lines.push(line);
                continue;
            };

            let lead = line[..first.0].trim_end_matches(|c: char| c.is_whitespace() || c == ',');
            if !lead.trim().is_empty() {
                trace_lines.push(lead);
            }

            for (i, (_, end, kind, field)) in markers.iter().enumerate() {
                let stop = markers.get(i + 1).map_or(line.len(), |next| next.0);
                let segment = &line[*end..stop];
                let value = segment.split(',').next().unwrap_or(segment).trim().to_string();
                match (kind.as_str(), field.as_str()) {
                    ("crash", "id") => crash_id = Some(value),
                    ("repository", "id") => repository_id = Some(value),
                    ("repository", "url") => repository_url = Some(value),
                    _ => {}
                }
            }
        }

        while trace_lines.last().is_some_and(|l| l.trim().is_empty()) {
            trace_lines.pop();
        }

        let crash_id = crash_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CrashLensError::InvalidSeed("missing 'crash id:' marker".into()))?;
        let repository_id = repository_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CrashLensError::InvalidSeed("missing 'repository id:' marker".into()))?;

        Ok(Self {
            stack_trace: trace_lines.join("\n"),
            crash_id,
            repository_id,
            repository_url: repository_url.filter(|s| !s.is_empty()),
        })
    }

    /// Render the seed as the single free-text block the model receives.
    pub fn render(&self) -> String {
        let mut out = self.stack_trace.trim_end().to_string();
        out.push_str(&format!("\ncrash id: {}", self.crash_id));
        out.push_str(&format!("\nrepository id: {}", self.repository_id));
        if let Some(url) = &self.repository_url {
            out.push_str(&format!("\nrepository url: {url}"));
        }
        out
    }

    /// Error classification, e.g. `requests.exceptions.ConnectTimeout`.
    pub fn error_signature(&self) -> Option<String> {
        error_signature(&self.stack_trace)
    }

    pub fn stack_frames(&self) -> Vec<StackFrame> {
        stack_frames(&self.stack_trace)
    }
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(crash|repository)\s+(id|url)\s*:").expect("valid regex")
    })
}

// ---------------------------------------------------------------------------
// Stack trace hints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

fn python_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*File "([^"]+)", line (\d+)(?:, in (\S+))?"#).expect("valid regex")
    })
}

fn jvm_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*at ([\w$.<>]+)\(([^():]+):(\d+)\)").expect("valid regex")
    })
}

fn js_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*at (?:(.+?) \()?([^()\s]+?):(\d+)(?::\d+)?\)?\s*$").expect("valid regex")
    })
}

fn signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][\w.$]*$").expect("valid regex"))
}

/// Extract `(file, line, function)` frames from Python, JVM and JS traces.
///
/// Lines in any other format are skipped.
pub fn stack_frames(trace: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    for line in trace.lines() {
        if let Some(c) = python_frame_re().captures(line) {
            if let Ok(n) = c[2].parse() {
                frames.push(StackFrame {
                    file: c[1].to_string(),
                    line: n,
                    function: c.get(3).map(|m| m.as_str().to_string()),
                });
            }
        } else if let Some(c) = jvm_frame_re().captures(line) {
            if let Ok(n) = c[3].parse() {
                frames.push(StackFrame {
                    file: c[2].to_string(),
                    line: n,
                    function: Some(c[1].to_string()),
                });
            }
        } else if let Some(c) = js_frame_re().captures(line) {
            if let Ok(n) = c[3].parse() {
                frames.push(StackFrame {
                    file: c[2].to_string(),
                    line: n,
                    function: c.get(1).map(|m| m.as_str().to_string()),
                });
            }
        }
    }
    frames
}

/// The exception type named by the trace, scanning upward from the last line.
///
/// Frame lines, `... N more` elisions and blank lines are skipped; a
/// `Caused by:` prefix is dropped.
pub fn error_signature(trace: &str) -> Option<String> {
    for raw in trace.lines().rev() {
        let line = raw.trim();
        if line.is_empty()
            || line.starts_with("at ")
            || line.starts_with("File \"")
            || line.starts_with("...")
            || line.starts_with("Traceback")
        {
            continue;
        }
        let line = line.strip_prefix("Caused by:").map(str::trim).unwrap_or(line);
        let head = line.split(':').next().unwrap_or(line).trim();
        if signature_re().is_match(head) {
            return Some(head.to_string());
        }
    }
    None
}
