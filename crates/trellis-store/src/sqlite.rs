//! SQLite implementation of [`ArtifactStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use trellis_types::{Artifact, ArtifactKind, Parameter, Schedule, Status};

use crate::storage::ArtifactStore;
use crate::{Result, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Schema Version
// ─────────────────────────────────────────────────────────────────────────────

/// Current schema version.
const SCHEMA_VERSION: i32 = 1;

const ARTIFACT_COLUMNS: &str = "id, kind, external_id, name, status, workspace_id, timestamp, \
     path, repo_url, artifact_type, topics";

const PARAMETER_COLUMNS: &str = "id, name, description, usage, displayed, value_type, format, \
     default_value, required, allowed_values, masked, actual_values";

const SCHEDULE_COLUMNS: &str =
    "id, workflow_id, name, start, end_flag, cron_expression, time_zone, timestamp";

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Artifact store backed by a single SQLite file.
///
/// One connection is opened and shared for the lifetime of the process.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteArtifactStore").finish_non_exhaustive()
    }
}

impl SqliteArtifactStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: path.display().to_string(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        info!(path = %path.display(), "Artifact store opened");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if current_version >= SCHEMA_VERSION {
            debug!("Schema up to date (version {})", current_version);
            return Ok(());
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                external_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                workspace_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                path TEXT NOT NULL,
                repo_url TEXT NOT NULL,
                artifact_type TEXT NOT NULL DEFAULT '',
                topics TEXT NOT NULL DEFAULT '[]',
                UNIQUE (kind, external_id)
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_timestamp
                ON artifacts(timestamp);

            CREATE TABLE IF NOT EXISTS parameters (
                id TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                usage TEXT NOT NULL DEFAULT '',
                displayed INTEGER NOT NULL DEFAULT 0,
                value_type TEXT NOT NULL DEFAULT '',
                format TEXT NOT NULL DEFAULT '',
                default_value TEXT NOT NULL DEFAULT '',
                required INTEGER NOT NULL DEFAULT 0,
                allowed_values TEXT NOT NULL DEFAULT '[]',
                masked INTEGER NOT NULL DEFAULT 0,
                actual_values TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX IF NOT EXISTS idx_parameters_artifact
                ON parameters(artifact_id);

            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                start INTEGER NOT NULL DEFAULT 0,
                end_flag INTEGER NOT NULL DEFAULT 0,
                cron_expression TEXT NOT NULL DEFAULT '',
                time_zone TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                UNIQUE (workflow_id, name)
            );
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        info!("Schema created (version {})", SCHEMA_VERSION);
        Ok(())
    }
}

impl ArtifactStore for SqliteArtifactStore {
    // ── Artifacts ───────────────────────────────────────────────────────

    fn find_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<Option<Artifact>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE kind = ?1 AND external_id = ?2"
        );
        Ok(conn
            .query_row(&sql, params![kind.as_str(), external_id], row_to_artifact)
            .optional()?)
    }

    fn get_artifact(&self, id: &str) -> Result<Option<Artifact>> {
        let conn = self.conn();
        let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], row_to_artifact).optional()?)
    }

    fn create_artifact(&self, artifact: &Artifact) -> Result<usize> {
        let conn = self.conn();
        let topics = serde_json::to_string(&artifact.topics)?;
        conn.execute(
            "INSERT INTO artifacts (id, kind, external_id, name, status, workspace_id, timestamp,
                                    path, repo_url, artifact_type, topics)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                artifact.id,
                artifact.kind.as_str(),
                artifact.external_id,
                artifact.name,
                artifact.status_code(),
                artifact.workspace_id,
                artifact.timestamp.to_rfc3339(),
                artifact.path,
                artifact.repo_url,
                artifact.artifact_type,
                topics,
            ],
        )
        .map_err(constraint_to_conflict)
    }

    fn save_artifact(&self, artifact: &Artifact) -> Result<usize> {
        let conn = self.conn();
        let topics = serde_json::to_string(&artifact.topics)?;
        Ok(conn.execute(
            "UPDATE artifacts
             SET name = ?2, status = ?3, workspace_id = ?4, timestamp = ?5, path = ?6,
                 repo_url = ?7, artifact_type = ?8, topics = ?9
             WHERE id = ?1",
            params![
                artifact.id,
                artifact.name,
                artifact.status_code(),
                artifact.workspace_id,
                artifact.timestamp.to_rfc3339(),
                artifact.path,
                artifact.repo_url,
                artifact.artifact_type,
                topics,
            ],
        )?)
    }

    fn delete_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<usize> {
        let conn = self.conn();
        Ok(conn.execute(
            "DELETE FROM artifacts WHERE kind = ?1 AND external_id = ?2",
            params![kind.as_str(), external_id],
        )?)
    }

    fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE kind = ?1 ORDER BY timestamp DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str()], row_to_artifact)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Parameters ──────────────────────────────────────────────────────

    fn list_parameters(&self, artifact_id: &str) -> Result<Vec<Parameter>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {PARAMETER_COLUMNS} FROM parameters WHERE artifact_id = ?1 ORDER BY seq"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![artifact_id], row_to_parameter)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize> {
        let Some(id) = &parameter.id else {
            return Err(StoreError::Conflict("parameter id is required".into()));
        };
        let conn = self.conn();
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM parameters WHERE artifact_id = ?1",
            params![artifact_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO parameters (id, artifact_id, seq, name, description, usage, displayed,
                                     value_type, format, default_value, required,
                                     allowed_values, masked, actual_values)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                id,
                artifact_id,
                seq,
                parameter.name,
                parameter.description,
                parameter.usage,
                parameter.displayed,
                parameter.value_type,
                parameter.format,
                parameter.default,
                parameter.required,
                serde_json::to_string(&parameter.allowed_values)?,
                parameter.masked,
                serde_json::to_string(&parameter.actual_values)?,
            ],
        )
        .map_err(constraint_to_conflict)
    }

    fn update_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize> {
        let Some(id) = &parameter.id else {
            return Ok(0);
        };
        let conn = self.conn();
        Ok(conn.execute(
            "UPDATE parameters
             SET name = ?3, description = ?4, usage = ?5, displayed = ?6, value_type = ?7,
                 format = ?8, default_value = ?9, required = ?10, allowed_values = ?11,
                 masked = ?12, actual_values = ?13
             WHERE id = ?1 AND artifact_id = ?2",
            params![
                id,
                artifact_id,
                parameter.name,
                parameter.description,
                parameter.usage,
                parameter.displayed,
                parameter.value_type,
                parameter.format,
                parameter.default,
                parameter.required,
                serde_json::to_string(&parameter.allowed_values)?,
                parameter.masked,
                serde_json::to_string(&parameter.actual_values)?,
            ],
        )?)
    }

    // ── Schedules ───────────────────────────────────────────────────────

    fn upsert_schedule(&self, schedule: &Schedule) -> Result<usize> {
        let conn = self.conn();
        let id = schedule.id.clone().unwrap_or_else(trellis_types::new_id);
        conn.execute(
            "INSERT INTO schedules (id, workflow_id, name, start, end_flag, cron_expression,
                                    time_zone, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (workflow_id, name) DO UPDATE SET
                 start = excluded.start,
                 end_flag = excluded.end_flag,
                 cron_expression = excluded.cron_expression,
                 time_zone = excluded.time_zone,
                 timestamp = excluded.timestamp",
            params![
                id,
                schedule.workflow_id,
                schedule.name,
                schedule.start,
                schedule.end,
                schedule.cron_expression,
                schedule.time_zone,
                schedule.timestamp.to_rfc3339(),
            ],
        )
        .map_err(constraint_to_conflict)
    }

    fn list_schedules(&self, workflow_id: &str) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let sql =
            format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE workflow_id = ?1 ORDER BY name");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![workflow_id], row_to_schedule)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn startup_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE start = 1 ORDER BY timestamp");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_schedule)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Mapping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("unrecognized {field} '{value}'")]
struct Unrecognized {
    field: &'static str,
    value: String,
}

fn conversion_error(idx: usize, field: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(Unrecognized { field, value }))
}

fn constraint_to_conflict(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(msg.unwrap_or_else(|| e.to_string()))
        }
        other => StoreError::Database(other),
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_list(idx: usize, s: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_kind(s: &str) -> Option<ArtifactKind> {
    match s {
        "workflow" => Some(ArtifactKind::Workflow),
        "app" => Some(ArtifactKind::App),
        _ => None,
    }
}

fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Artifact> {
    let kind_str: String = row.get(1)?;
    let kind = parse_kind(&kind_str).ok_or_else(|| conversion_error(1, "kind", kind_str))?;
    let status_str: String = row.get(4)?;
    let status = Status::from_code(kind, &status_str)
        .ok_or_else(|| conversion_error(4, "status", status_str))?;

    Ok(Artifact {
        id: row.get(0)?,
        kind,
        external_id: row.get(2)?,
        name: row.get(3)?,
        status,
        workspace_id: row.get(5)?,
        timestamp: parse_dt(&row.get::<_, String>(6)?),
        path: row.get(7)?,
        repo_url: row.get(8)?,
        artifact_type: row.get(9)?,
        topics: parse_list(10, &row.get::<_, String>(10)?)?,
    })
}

fn row_to_parameter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Parameter> {
    Ok(Parameter {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        usage: row.get(3)?,
        displayed: row.get(4)?,
        value_type: row.get(5)?,
        format: row.get(6)?,
        default: row.get(7)?,
        required: row.get(8)?,
        allowed_values: parse_list(9, &row.get::<_, String>(9)?)?,
        masked: row.get(10)?,
        actual_values: parse_list(11, &row.get::<_, String>(11)?)?,
    })
}

fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: Some(row.get(0)?),
        workflow_id: row.get(1)?,
        name: row.get(2)?,
        start: row.get(3)?,
        end: row.get(4)?,
        cron_expression: row.get(5)?,
        time_zone: row.get(6)?,
        timestamp: parse_dt(&row.get::<_, String>(7)?),
    })
}
