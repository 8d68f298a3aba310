//! Root-cause analysis record, one per crash.
//!
//! Field names and nullability are the durable contract read by the PR
//! pipeline and dashboards, so they mirror the `crash_rca` table exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CrashRca
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRca {
    pub id: String,
    pub crash_id: String,
    pub description: Option<String>,
    pub problem_identification: Option<String>,
    pub data_collection: Option<String>,
    pub root_cause_identification: Option<String>,
    pub solution: Option<String>,
    pub author: Option<Vec<String>>,
    pub supporting_documents: Option<Vec<String>>,
    /// Unified diff of the proposed fix. Null until an investigation saves one.
    pub git_diff: Option<String>,
    /// Set by the PR pipeline once a pull request exists.
    pub pull_request_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrashRca {
    /// A root-cause narrative has been recorded.
    pub fn is_populated(&self) -> bool {
        has_text(&self.root_cause_identification)
    }

    /// A diff is available and no pull request has been opened for it yet.
    ///
    /// An RCA saved without a diff is a valid resting state and reports `false`.
    pub fn can_create_pr(&self) -> bool {
        has_text(&self.git_diff) && self.pull_request_url.is_none()
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// RcaFields
// ---------------------------------------------------------------------------

/// Partial update payload for [`CrashRca`].
///
/// `None` means "leave the stored value alone"; it never clears a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RcaFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_identification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause_identification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_documents: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_diff: Option<String>,
}

impl RcaFields {
    pub fn is_empty(&self) -> bool {
        self == &RcaFields::default()
    }
}
