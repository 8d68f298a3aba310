//! AST-derived code chunks as returned by the semantic code index.
//!
//! Chunks are produced by the indexing pipeline and only ever read here.
//! `(file_path, line_start)` re-identifies a chunk across index runs; the
//! chunk name is not unique (the same function name appears in many files).

use crate::error::CrashLensError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ChunkKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Class,
    Import,
    Variable,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Import => "import",
            ChunkKind::Variable => "variable",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkKind {
    type Err = CrashLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" | "method" => Ok(ChunkKind::Function),
            "class" => Ok(ChunkKind::Class),
            "import" => Ok(ChunkKind::Import),
            "variable" => Ok(ChunkKind::Variable),
            other => Err(CrashLensError::InvalidChunkKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SemanticCodeChunk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticCodeChunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub name: String,
    /// Source text of the chunk.
    #[serde(alias = "content")]
    pub text: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub language: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub calls_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    /// Similarity score reported by the index, when it provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SemanticCodeChunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            file_path: self.file_path.clone(),
            line_start: self.line_start,
        }
    }

    /// `Class.method` for methods, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.parent_class {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Stable re-identification key for a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub file_path: String,
    pub line_start: u32,
}

// ---------------------------------------------------------------------------
// CodeHit
// ---------------------------------------------------------------------------

/// The compact view of a chunk handed to the model by `search_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeHit {
    pub text: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub name: String,
    pub line_start: u32,
    pub line_end: u32,
    pub language: String,
}

impl From<SemanticCodeChunk> for CodeHit {
    fn from(chunk: SemanticCodeChunk) -> Self {
        let name = chunk.qualified_name();
        CodeHit {
            text: chunk.text,
            file_path: chunk.file_path,
            kind: chunk.kind,
            name,
            line_start: chunk.line_start,
            line_end: chunk.line_end,
            language: chunk.language,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentHit
// ---------------------------------------------------------------------------

/// A ranked reference into the design document corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    /// URL or corpus-relative reference to the page.
    #[serde(alias = "url")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, name: &str, line: u32) -> SemanticCodeChunk {
        SemanticCodeChunk {
            kind: ChunkKind::Function,
            name: name.into(),
            text: format!("def {name}(): ..."),
            file_path: path.into(),
            line_start: line,
            line_end: line + 10,
            language: "python".into(),
            parameters: vec![],
            return_type: None,
            imports: vec![],
            calls_to: vec![],
            parent_class: None,
            score: None,
        }
    }

    #[test]
    fn same_name_in_different_files_has_distinct_keys() {
        let a = chunk("app/payment.py", "charge", 30);
        let b = chunk("app/billing.py", "charge", 30);
        assert_eq!(a.name, b.name);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn parses_indexer_payload_with_missing_lists() {
        let json = r#"{
            "type": "function",
            "name": "initialize_payment",
            "content": "def initialize_payment(order): ...",
            "file_path": "backend/core/paystack.py",
            "line_start": 30,
            "line_end": 40,
            "language": "python",
            "parent_class": "PaystackClient"
        }"#;
        let c: SemanticCodeChunk = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, ChunkKind::Function);
        assert!(c.parameters.is_empty());
        assert_eq!(c.qualified_name(), "PaystackClient.initialize_payment");
    }

    #[test]
    fn code_hit_keeps_location_and_qualified_name() {
        let mut c = chunk("payment.py", "charge", 30);
        c.parent_class = Some("Gateway".into());
        let hit = CodeHit::from(c);
        assert_eq!(hit.name, "Gateway.charge");
        assert_eq!((hit.line_start, hit.line_end), (30, 40));
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["type"], "function");
    }

    #[test]
    fn chunk_kind_accepts_method_alias() {
        assert_eq!("method".parse::<ChunkKind>().unwrap(), ChunkKind::Function);
        assert!("module".parse::<ChunkKind>().is_err());
    }

    #[test]
    fn document_hit_accepts_url_alias() {
        let hit: DocumentHit =
            serde_json::from_str(r#"{"url": "https://docs.example.com/p/3"}"#).unwrap();
        assert_eq!(hit.reference, "https://docs.example.com/p/3");
        assert!(hit.text.is_none());
    }
}
