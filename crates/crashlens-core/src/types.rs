use crate::error::CrashLensError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Crash severity. Variant order is the severity order, so `Ord` compares
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = CrashLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(CrashLensError::InvalidSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CrashStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl CrashStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CrashStatus::Open => "open",
            CrashStatus::Investigating => "investigating",
            CrashStatus::Resolved => "resolved",
            CrashStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for CrashStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrashStatus {
    type Err = CrashLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(CrashStatus::Open),
            "investigating" => Ok(CrashStatus::Investigating),
            "resolved" => Ok(CrashStatus::Resolved),
            "closed" => Ok(CrashStatus::Closed),
            _ => Err(CrashLensError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CrashReport
// ---------------------------------------------------------------------------

/// One crash occurrence, owned by the reporting subsystem.
///
/// The investigation loop only ever sees the crash id; results are written
/// through [`crate::rca::CrashRca`], never back onto this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    pub id: String,
    pub component: String,
    pub error_type: String,
    pub severity: Severity,
    pub status: CrashStatus,
    pub impacted_users: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub repository_id: String,
    /// Pointer (usually a URL) to the raw error log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrashReport {
    pub fn new(
        component: impl Into<String>,
        error_type: impl Into<String>,
        severity: Severity,
        impacted_users: u32,
        repository_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            component: component.into(),
            error_type: error_type.into(),
            severity,
            status: CrashStatus::Open,
            impacted_users,
            comment: None,
            repository_id: repository_id.into(),
            error_log: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}
