//! SQLite-backed [`StateStore`].
//!
//! The agent persists whole-state snapshots, so the schema is a single
//! keyed table whose rows are replaced on every save. A corrupt payload is
//! treated like a missing snapshot: the load warns and returns `None` so
//! the agent restarts from defaults instead of refusing to start.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use decision_agent_core::store::{
    AdaptationHistorySnapshot, ExperienceLogSnapshot, ParameterSetSnapshot, StateStore,
};
use decision_agent_core::{format_rfc3339, now_utc, AgentError};

const SNAPSHOT_EXPERIENCE_LOG: &str = "experience_log";
const SNAPSHOT_PARAMETER_SET: &str = "parameter_set";
const SNAPSHOT_ADAPTATION_HISTORY: &str = "adaptation_history";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
  name TEXT PRIMARY KEY,
  payload_json TEXT NOT NULL,
  saved_at TEXT NOT NULL
);
";

pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// snapshot schema exists.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database, used by tests and dry runs.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        conn.execute_batch(SCHEMA)
            .context("failed to apply snapshot schema")?;

        Ok(Self { conn })
    }

    fn load_snapshot<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AgentError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| AgentError::Storage(format!("failed to load snapshot {name}: {err}")))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(
                    snapshot = name,
                    error = %err,
                    "corrupt snapshot payload, falling back to defaults"
                );
                Ok(None)
            }
        }
    }

    fn save_snapshot<T: Serialize>(&self, name: &str, snapshot: &T) -> Result<(), AgentError> {
        let payload = serde_json::to_string(snapshot).map_err(|err| {
            AgentError::Storage(format!("failed to serialize snapshot {name}: {err}"))
        })?;
        let saved_at = format_rfc3339(now_utc())
            .map_err(|err| AgentError::Storage(err.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO snapshots(name, payload_json, saved_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   saved_at = excluded.saved_at",
                params![name, payload, saved_at],
            )
            .map_err(|err| AgentError::Storage(format!("failed to save snapshot {name}: {err}")))?;

        Ok(())
    }
}

impl StateStore for SqliteStateStore {
    fn load_experience_log(&self) -> Result<Option<ExperienceLogSnapshot>, AgentError> {
        self.load_snapshot(SNAPSHOT_EXPERIENCE_LOG)
    }

    fn save_experience_log(&self, snapshot: &ExperienceLogSnapshot) -> Result<(), AgentError> {
        self.save_snapshot(SNAPSHOT_EXPERIENCE_LOG, snapshot)
    }

    fn load_parameter_set(&self) -> Result<Option<ParameterSetSnapshot>, AgentError> {
        self.load_snapshot(SNAPSHOT_PARAMETER_SET)
    }

    fn save_parameter_set(&self, snapshot: &ParameterSetSnapshot) -> Result<(), AgentError> {
        self.save_snapshot(SNAPSHOT_PARAMETER_SET, snapshot)
    }

    fn load_adaptation_history(&self) -> Result<Option<AdaptationHistorySnapshot>, AgentError> {
        self.load_snapshot(SNAPSHOT_ADAPTATION_HISTORY)
    }

    fn save_adaptation_history(
        &self,
        snapshot: &AdaptationHistorySnapshot,
    ) -> Result<(), AgentError> {
        self.save_snapshot(SNAPSHOT_ADAPTATION_HISTORY, snapshot)
    }
}
