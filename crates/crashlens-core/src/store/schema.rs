//! SQLite schema for repositories, crashes and their root-cause analyses.
//!
//! Timestamps are RFC 3339 strings with microsecond precision so that they
//! sort lexically. List-valued RCA columns hold JSON arrays.

pub const SCHEMA: &str = r#"
-- ============================================
-- REPOSITORIES
-- ============================================

CREATE TABLE IF NOT EXISTS repository (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    document_url TEXT
);

-- ============================================
-- CRASHES
-- ============================================

-- Owned by the crash reporting pipeline; the investigation only reads it.
CREATE TABLE IF NOT EXISTS crash (
    id TEXT PRIMARY KEY,
    component TEXT NOT NULL,
    error_type TEXT NOT NULL,
    severity TEXT NOT NULL,                -- 'low' | 'medium' | 'high' | 'critical'
    status TEXT NOT NULL DEFAULT 'open',
    impacted_users INTEGER NOT NULL DEFAULT 0,
    comment TEXT,
    repository_id TEXT NOT NULL,
    error_log TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crash_repository ON crash(repository_id);

-- ============================================
-- ROOT CAUSE ANALYSES
-- ============================================

-- At most one row per crash. crash_id is not a foreign key: investigations
-- may run against crashes recorded in another system.
CREATE TABLE IF NOT EXISTS crash_rca (
    id TEXT PRIMARY KEY,
    crash_id TEXT NOT NULL UNIQUE,
    description TEXT,
    problem_identification TEXT,
    data_collection TEXT,
    root_cause_identification TEXT,
    solution TEXT,
    author TEXT,                           -- JSON array
    supporting_documents TEXT,             -- JSON array
    git_diff TEXT,
    pull_request_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crash_rca_updated ON crash_rca(updated_at);
"#;
