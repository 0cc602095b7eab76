//! SQLite Project Store with Connection Pooling and Safe Transactions
//!
//! - Connection pooling via r2d2
//! - Panic-safe transactions with automatic rollback
//! - WAL mode
//! - Snapshot stored as JSON in one row, every patch applied
//!   read-modify-write inside a transaction and recorded in `patch_log`

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use super::{ProjectPatch, ProjectState, ProjectStore};
use crate::types::{PipelineError, Result, ResultExt};

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // One writer at a time; a second connection serves status reads.
        Self {
            max_size: 2,
            min_idle: 1,
            connection_timeout_secs: 30,
        }
    }
}

/// One row of the patch log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchLogEntry {
    pub revision: u64,
    pub kind: String,
    pub episode_id: Option<u32>,
    pub applied_at: String,
}

/// Pooled SQLite-backed `ProjectStore`.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open the store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                PipelineError::Storage(format!("Failed to create connection pool: {}", e))
            })?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory store for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder().max_size(1).build(manager).map_err(|e| {
            PipelineError::Storage(format!("Failed to create in-memory pool: {}", e))
        })?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            PipelineError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if version > SCHEMA_VERSION {
            return Err(PipelineError::Storage(format!(
                "Project database schema v{} is newer than supported v{}",
                version, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// If the closure fails or panics the transaction is rolled back.
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(PipelineError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    fn load_state(conn: &Connection) -> Result<ProjectState> {
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM project_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(PipelineError::NotInitialized),
        }
    }

    fn save_state(conn: &Connection, state: &ProjectState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO project_state (id, revision, state_json, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            params![state.revision as i64, json, now],
        )
        .with_context("Failed to save project state")?;
        Ok(())
    }

    /// Whether a project state has been stored
    pub fn is_initialized(&self) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM project_state", [], |row| {
            row.get(0)
        })?;
        Ok(count > 0)
    }

    /// Most recent patch log entries, newest first.
    pub fn recent_patches(&self, limit: usize) -> Result<Vec<PatchLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT revision, kind, episode_id, applied_at FROM patch_log
             ORDER BY revision DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PatchLogEntry {
                revision: row.get::<_, i64>(0)? as u64,
                kind: row.get(1)?,
                episode_id: row.get::<_, Option<i64>>(2)?.map(|id| id as u32),
                applied_at: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to read patch log")
    }
}

impl ProjectStore for SqliteStore {
    fn snapshot(&self) -> Result<ProjectState> {
        let conn = self.conn()?;
        Self::load_state(&conn)
    }

    fn apply(&self, patch: ProjectPatch) -> Result<ProjectState> {
        let kind = patch.kind();
        let episode_id = patch.episode_id();

        self.transaction(|conn| {
            let mut state = Self::load_state(conn)?;
            state.apply(patch)?;
            Self::save_state(conn, &state)?;

            conn.execute(
                "INSERT INTO patch_log (id, revision, kind, episode_id, applied_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    state.revision as i64,
                    kind,
                    episode_id.map(i64::from),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .with_context("Failed to append patch log")?;

            tracing::debug!(revision = state.revision, kind, "Applied project patch");
            Ok(state)
        })
    }

    fn replace(&self, state: ProjectState) -> Result<()> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM patch_log", [])?;
            Self::save_state(conn, &state)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Phase;
    use crate::types::{Episode, EpisodeStatus, Shot};
    use tempfile::TempDir;

    fn sample_state() -> ProjectState {
        let mut ep = Episode::new(1, "Pilot", "INT. KITCHEN - NIGHT");
        ep.shots = vec![Shot::new("1-1-01", "Kettle boils")];
        ProjectState::new("demo", "script", vec![ep])
    }

    #[test]
    fn test_open_in_memory_not_initialized() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.is_initialized().unwrap());
        assert!(matches!(
            store.snapshot(),
            Err(PipelineError::NotInitialized)
        ));
    }

    #[test]
    fn test_apply_persists_and_logs() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.replace(sample_state()).unwrap();

        store
            .apply(ProjectPatch::EpisodeStatusSet {
                episode_id: 1,
                status: EpisodeStatus::ConfirmedShots,
            })
            .unwrap();
        store
            .apply(ProjectPatch::PhaseChanged {
                phase: Phase::PromptGeneration,
            })
            .unwrap();

        let state = store.snapshot().unwrap();
        assert_eq!(state.phase, Phase::PromptGeneration);
        assert_eq!(state.episodes[0].status, EpisodeStatus::ConfirmedShots);
        assert_eq!(state.revision, 2);

        let log = store.recent_patches(10).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, "phase_changed");
        assert_eq!(log[1].episode_id, Some(1));
    }

    #[test]
    fn test_rejected_patch_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.replace(sample_state()).unwrap();

        let err = store
            .apply(ProjectPatch::PromptsCompleted { episode_id: 1 })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(store.snapshot().unwrap().revision, 0);
        assert!(store.recent_patches(10).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.replace(sample_state()).unwrap();
            store.apply(ProjectPatch::CursorMoved { cursor: 1 }).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let state = reopened.snapshot().unwrap();
        assert_eq!(state.cursor, 1);
        assert_eq!(state.episodes[0].shots[0].id, "1-1-01");
    }

    #[test]
    fn test_transaction_panic_safety() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.replace(sample_state()).unwrap();

        let result: Result<()> = store.transaction(|conn| {
            conn.execute("DELETE FROM project_state", [])?;
            panic!("boom");
        });
        assert!(matches!(result, Err(PipelineError::Storage(_))));
        assert!(store.is_initialized().unwrap());
    }
}
