//! SQLite persistence for crashes and their root-cause analyses.
//!
//! [`RcaStore`] is a cloneable handle; every clone shares one connection, so
//! concurrent investigations serialize on the mutex and, across processes,
//! on SQLite's write lock (`BEGIN IMMEDIATE` + busy timeout).

mod schema;

use crate::error::{CrashLensError, Result};
use crate::rca::{CrashRca, RcaFields};
use crate::types::{CrashReport, Repository};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub use schema::SCHEMA;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RCA_COLUMNS: &str = "id, crash_id, description, problem_identification, data_collection, \
     root_cause_identification, solution, author, supporting_documents, git_diff, \
     pull_request_url, created_at, updated_at";

const CRASH_COLUMNS: &str = "id, component, error_type, severity, status, impacted_users, \
     comment, repository_id, error_log, created_at, updated_at";

#[derive(Clone)]
pub struct RcaStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for RcaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcaStore").finish_non_exhaustive()
    }
}

impl RcaStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        // journal_mode reports the resulting mode as a row.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened rca store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied write:
        // uncommitted transactions roll back on drop.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ============================================
    // ROOT CAUSE ANALYSES
    // ============================================

    /// Insert or update the RCA for `crash_id` in one write transaction.
    ///
    /// Supplied fields overwrite stored ones; `None` fields keep their stored
    /// value. The row keeps its `id` and `created_at`; `updated_at` strictly
    /// increases on every call.
    pub fn upsert_rca(&self, crash_id: &str, fields: &RcaFields) -> Result<CrashRca> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT updated_at FROM crash_rca WHERE crash_id = ?1",
                params![crash_id],
                |row| row.get(0),
            )
            .optional()?;
        let stamp = next_stamp(crash_id, previous.as_deref())?;

        let author = encode_list(&fields.author)?;
        let supporting_documents = encode_list(&fields.supporting_documents)?;

        tx.execute(
            "INSERT INTO crash_rca (id, crash_id, description, problem_identification,
                 data_collection, root_cause_identification, solution, author,
                 supporting_documents, git_diff, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(crash_id) DO UPDATE SET
                 description = COALESCE(excluded.description, crash_rca.description),
                 problem_identification = COALESCE(excluded.problem_identification, crash_rca.problem_identification),
                 data_collection = COALESCE(excluded.data_collection, crash_rca.data_collection),
                 root_cause_identification = COALESCE(excluded.root_cause_identification, crash_rca.root_cause_identification),
                 solution = COALESCE(excluded.solution, crash_rca.solution),
                 author = COALESCE(excluded.author, crash_rca.author),
                 supporting_documents = COALESCE(excluded.supporting_documents, crash_rca.supporting_documents),
                 git_diff = COALESCE(excluded.git_diff, crash_rca.git_diff),
                 updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                crash_id,
                fields.description,
                fields.problem_identification,
                fields.data_collection,
                fields.root_cause_identification,
                fields.solution,
                author,
                supporting_documents,
                fields.git_diff,
                stamp,
            ],
        )?;

        let rca = query_rca(&tx, crash_id)?
            .ok_or_else(|| CrashLensError::RcaNotFound(crash_id.to_string()))?;
        tx.commit()?;

        tracing::debug!(
            crash_id,
            created = previous.is_none(),
            updated_at = %rca.updated_at,
            "upserted rca"
        );
        Ok(rca)
    }

    /// Attach a diff to the crash's RCA, creating the row when none exists.
    pub fn append_diff(&self, crash_id: &str, diff: &str) -> Result<CrashRca> {
        if diff.trim().is_empty() {
            return Err(CrashLensError::EmptyDiff(crash_id.to_string()));
        }
        self.upsert_rca(
            crash_id,
            &RcaFields {
                git_diff: Some(diff.to_string()),
                ..Default::default()
            },
        )
    }

    /// Create an all-null RCA row for `crash_id` unless one exists.
    pub fn create_empty_rca(&self, crash_id: &str) -> Result<CrashRca> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_empty_rca(&tx, crash_id)?;
        let rca = query_rca(&tx, crash_id)?
            .ok_or_else(|| CrashLensError::RcaNotFound(crash_id.to_string()))?;
        tx.commit()?;
        Ok(rca)
    }

    pub fn get_rca(&self, crash_id: &str) -> Result<Option<CrashRca>> {
        let conn = self.lock();
        query_rca(&conn, crash_id)
    }

    /// All RCAs, most recently updated first.
    pub fn list_rcas(&self) -> Result<Vec<CrashRca>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RCA_COLUMNS} FROM crash_rca ORDER BY updated_at DESC, crash_id"
        ))?;
        let raws = stmt
            .query_map([], RawRca::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawRca::decode).collect()
    }

    /// Record the pull request opened for the crash's diff.
    pub fn set_pull_request_url(&self, crash_id: &str, url: &str) -> Result<CrashRca> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT updated_at FROM crash_rca WHERE crash_id = ?1",
                params![crash_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(previous) = previous else {
            return Err(CrashLensError::RcaNotFound(crash_id.to_string()));
        };
        let stamp = next_stamp(crash_id, Some(&previous))?;
        tx.execute(
            "UPDATE crash_rca SET pull_request_url = ?1, updated_at = ?2 WHERE crash_id = ?3",
            params![url, stamp, crash_id],
        )?;
        let rca = query_rca(&tx, crash_id)?
            .ok_or_else(|| CrashLensError::RcaNotFound(crash_id.to_string()))?;
        tx.commit()?;
        Ok(rca)
    }

    // ============================================
    // REPOSITORIES & CRASHES
    // ============================================

    pub fn insert_repository(&self, repo: &Repository) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO repository (id, name, url, document_url) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name, url = excluded.url, document_url = excluded.document_url",
            params![repo.id, repo.name, repo.url, repo.document_url],
        )?;
        Ok(())
    }

    pub fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let conn = self.lock();
        let repo = conn
            .query_row(
                "SELECT id, name, url, document_url FROM repository WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Repository {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        url: row.get(2)?,
                        document_url: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(repo)
    }

    /// Register a crash together with its empty RCA row.
    pub fn insert_crash(&self, crash: &CrashReport) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            &format!(
                "INSERT INTO crash ({CRASH_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                crash.id,
                crash.component,
                crash.error_type,
                crash.severity.as_str(),
                crash.status.as_str(),
                crash.impacted_users,
                crash.comment,
                crash.repository_id,
                crash.error_log,
                format_stamp(crash.created_at),
                format_stamp(crash.updated_at),
            ],
        )?;
        insert_empty_rca(&tx, &crash.id)?;
        tx.commit()?;
        tracing::info!(crash_id = %crash.id, component = %crash.component, "registered crash");
        Ok(())
    }

    pub fn get_crash(&self, id: &str) -> Result<Option<CrashReport>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {CRASH_COLUMNS} FROM crash WHERE id = ?1"),
                params![id],
                RawCrash::from_row,
            )
            .optional()?;
        raw.map(RawCrash::decode).transpose()
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn insert_empty_rca(conn: &Connection, crash_id: &str) -> Result<()> {
    let stamp = format_stamp(Utc::now());
    conn.execute(
        "INSERT INTO crash_rca (id, crash_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(crash_id) DO NOTHING",
        params![uuid::Uuid::new_v4().to_string(), crash_id, stamp],
    )?;
    Ok(())
}

fn query_rca(conn: &Connection, crash_id: &str) -> Result<Option<CrashRca>> {
    let raw = conn
        .query_row(
            &format!("SELECT {RCA_COLUMNS} FROM crash_rca WHERE crash_id = ?1"),
            params![crash_id],
            RawRca::from_row,
        )
        .optional()?;
    raw.map(RawRca::decode).transpose()
}

struct RawRca {
    id: String,
    crash_id: String,
    description: Option<String>,
    problem_identification: Option<String>,
    data_collection: Option<String>,
    root_cause_identification: Option<String>,
    solution: Option<String>,
    author: Option<String>,
    supporting_documents: Option<String>,
    git_diff: Option<String>,
    pull_request_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRca {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            crash_id: row.get(1)?,
            description: row.get(2)?,
            problem_identification: row.get(3)?,
            data_collection: row.get(4)?,
            root_cause_identification: row.get(5)?,
            solution: row.get(6)?,
            author: row.get(7)?,
            supporting_documents: row.get(8)?,
            git_diff: row.get(9)?,
            pull_request_url: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn decode(self) -> Result<CrashRca> {
        let crash_id = self.crash_id;
        Ok(CrashRca {
            author: decode_list(&crash_id, "author", self.author)?,
            supporting_documents: decode_list(
                &crash_id,
                "supporting_documents",
                self.supporting_documents,
            )?,
            created_at: parse_stamp(&crash_id, "created_at", &self.created_at)?,
            updated_at: parse_stamp(&crash_id, "updated_at", &self.updated_at)?,
            id: self.id,
            description: self.description,
            problem_identification: self.problem_identification,
            data_collection: self.data_collection,
            root_cause_identification: self.root_cause_identification,
            solution: self.solution,
            git_diff: self.git_diff,
            pull_request_url: self.pull_request_url,
            crash_id,
        })
    }
}

struct RawCrash {
    id: String,
    component: String,
    error_type: String,
    severity: String,
    status: String,
    impacted_users: u32,
    comment: Option<String>,
    repository_id: String,
    error_log: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawCrash {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            component: row.get(1)?,
            error_type: row.get(2)?,
            severity: row.get(3)?,
            status: row.get(4)?,
            impacted_users: row.get(5)?,
            comment: row.get(6)?,
            repository_id: row.get(7)?,
            error_log: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn decode(self) -> Result<CrashReport> {
        Ok(CrashReport {
            severity: self.severity.parse()?,
            status: self.status.parse()?,
            created_at: parse_stamp(&self.id, "created_at", &self.created_at)?,
            updated_at: parse_stamp(&self.id, "updated_at", &self.updated_at)?,
            id: self.id,
            component: self.component,
            error_type: self.error_type,
            impacted_users: self.impacted_users,
            comment: self.comment,
            repository_id: self.repository_id,
            error_log: self.error_log,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_list(list: &Option<Vec<String>>) -> Result<Option<String>> {
    list.as_ref()
        .map(|items| serde_json::to_string(items).map_err(CrashLensError::from))
        .transpose()
}

fn decode_list(
    crash_id: &str,
    column: &'static str,
    raw: Option<String>,
) -> Result<Option<Vec<String>>> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| CrashLensError::CorruptRow {
            crash_id: crash_id.to_string(),
            column,
            reason: e.to_string(),
        })
    })
    .transpose()
}

fn format_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(crash_id: &str, column: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CrashLensError::CorruptRow {
            crash_id: crash_id.to_string(),
            column,
            reason: e.to_string(),
        })
}

/// The current time at microsecond precision, moved past `previous` when the
/// clock has not advanced beyond it.
fn next_stamp(crash_id: &str, previous: Option<&str>) -> Result<String> {
    let now = Utc::now().timestamp_micros();
    let micros = match previous {
        Some(raw) => {
            let prev = parse_stamp(crash_id, "updated_at", raw)?.timestamp_micros();
            now.max(prev + 1)
        }
        None => now,
    };
    let at = Utc
        .timestamp_opt(
            micros.div_euclid(1_000_000),
            (micros.rem_euclid(1_000_000) * 1_000) as u32,
        )
        .single()
        .ok_or_else(|| CrashLensError::CorruptRow {
            crash_id: crash_id.to_string(),
            column: "updated_at",
            reason: format!("timestamp out of range: {micros}"),
        })?;
    Ok(format_stamp(at))
}
