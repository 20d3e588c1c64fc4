//! SQLite schema management and upserts.
//!
//! # Schema
//!
//! - `sessions`: one row per session, keyed by `session_id`
//! - `messages`: one row per turn, keyed by `(session_id, message_index)`
//! - `messages_fts`: external-content FTS5 index over `content` and
//!   `thinking`, kept current by triggers
//! - views: `tool_usage`, `sessions_overview`, `projects_summary`,
//!   `daily_activity`, `model_usage`
//!
//! # Key Functions
//!
//! - [`open_database`]: Open a file, configure it and create the tables
//! - [`save_session`] / [`save_session_tx`]: Upsert one normalized session
//! - [`finalize_schema`]: Indexes, FTS and views, run once per import
//!
//! # Transaction Pattern
//!
//! Functions with `_tx` suffix operate within an existing transaction.
//! Non-`_tx` variants create their own transaction.

use crate::model::{NormalizedSession, SessionRow};
use rusqlite::{Connection, Transaction, params};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
  session_id TEXT PRIMARY KEY,
  project TEXT,
  cwd TEXT,
  client_version TEXT,
  permission_mode TEXT,
  models TEXT,
  summary TEXT,
  custom_title TEXT,
  start_time TEXT,
  end_time TEXT,
  message_count INTEGER,
  user_message_count INTEGER,
  assistant_message_count INTEGER,
  total_input_tokens INTEGER,
  total_output_tokens INTEGER,
  total_tokens INTEGER,
  file_path TEXT,
  file_size_bytes INTEGER,
  source TEXT
);

CREATE TABLE IF NOT EXISTS messages (
  session_id TEXT NOT NULL REFERENCES sessions(session_id),
  message_index INTEGER NOT NULL,
  role TEXT,
  content TEXT,
  thinking TEXT,
  timestamp TEXT,
  uuid TEXT,
  parent_uuid TEXT,
  model TEXT,
  record_type TEXT,
  tool_names TEXT,
  tool_use_id TEXT,
  is_tool_result INTEGER,
  is_sidechain INTEGER,
  input_tokens INTEGER,
  output_tokens INTEGER,
  cache_read_tokens INTEGER,
  cache_create_tokens INTEGER,
  stop_reason TEXT,
  duration_ms INTEGER,
  PRIMARY KEY (session_id, message_index)
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project);
CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);
CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_messages_role ON messages(role);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_model ON messages(model);
"#;

const MESSAGES_FTS: &str = r#"
CREATE VIRTUAL TABLE messages_fts USING fts5(
  content,
  thinking,
  content='messages'
);

CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
  INSERT INTO messages_fts (rowid, content, thinking)
  VALUES (new.rowid, new.content, new.thinking);
END;

CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
  INSERT INTO messages_fts (messages_fts, rowid, content, thinking)
  VALUES ('delete', old.rowid, old.content, old.thinking);
END;

CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
  INSERT INTO messages_fts (messages_fts, rowid, content, thinking)
  VALUES ('delete', old.rowid, old.content, old.thinking);
  INSERT INTO messages_fts (rowid, content, thinking)
  VALUES (new.rowid, new.content, new.thinking);
END;

INSERT INTO messages_fts (messages_fts) VALUES ('rebuild');
"#;

struct ViewDef {
    name: &'static str,
    requires: &'static [&'static str],
    sql: &'static str,
}

const VIEWS: &[ViewDef] = &[
    ViewDef {
        name: "tool_usage",
        requires: &["messages"],
        sql: "SELECT
                json_each.value AS tool_name,
                count(*) AS uses,
                count(DISTINCT session_id) AS sessions
            FROM messages, json_each(messages.tool_names)
            WHERE tool_names IS NOT NULL
            GROUP BY tool_name
            ORDER BY uses DESC",
    },
    ViewDef {
        name: "sessions_overview",
        requires: &["sessions"],
        sql: "SELECT
                session_id,
                project,
                coalesce(custom_title, summary, session_id) AS title,
                start_time,
                end_time,
                message_count,
                user_message_count,
                assistant_message_count,
                total_input_tokens,
                total_output_tokens,
                total_tokens,
                models,
                client_version,
                source
            FROM sessions
            ORDER BY start_time DESC",
    },
    ViewDef {
        name: "projects_summary",
        requires: &["sessions"],
        sql: "SELECT
                project,
                count(*) AS session_count,
                sum(message_count) AS total_messages,
                sum(total_tokens) AS total_tokens,
                min(start_time) AS first_session,
                max(end_time) AS last_session
            FROM sessions
            GROUP BY project
            ORDER BY session_count DESC",
    },
    ViewDef {
        name: "daily_activity",
        requires: &["sessions"],
        sql: "SELECT
                date(start_time) AS day,
                count(*) AS sessions,
                sum(message_count) AS messages,
                sum(total_tokens) AS tokens,
                sum(user_message_count) AS user_messages,
                sum(assistant_message_count) AS assistant_messages
            FROM sessions
            WHERE start_time IS NOT NULL
            GROUP BY date(start_time)
            ORDER BY day DESC",
    },
    ViewDef {
        name: "model_usage",
        requires: &["messages"],
        sql: "SELECT
                model,
                count(*) AS message_count,
                count(DISTINCT session_id) AS session_count,
                sum(input_tokens) AS total_input_tokens,
                sum(output_tokens) AS total_output_tokens
            FROM messages
            WHERE model IS NOT NULL
            GROUP BY model
            ORDER BY message_count DESC",
    },
];

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("sqlite error: {source}")]
    Sqlite { source: rusqlite::Error },
}

impl From<rusqlite::Error> for IndexError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Sqlite { source }
    }
}

/// Open (or create) a database file ready for upserts.
pub fn open_database(path: &Path) -> Result<Connection, IndexError> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), IndexError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Configure SQLite connection for bulk imports.
///
/// Settings:
/// - WAL mode: readers are not blocked while an import runs
/// - synchronous=NORMAL: good durability/speed tradeoff
/// - busy_timeout=5000ms: retry on lock contention instead of immediate failure
pub fn configure_connection(conn: &Connection) -> Result<(), IndexError> {
    conn.pragma_update(None, "busy_timeout", 5000)?;
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

pub fn save_session(conn: &mut Connection, normalized: &NormalizedSession) -> Result<(), IndexError> {
    let tx = conn.transaction()?;
    save_session_tx(&tx, normalized)?;
    tx.commit()?;
    Ok(())
}

/// Upsert a session and its messages.
///
/// Rows are updated in place so FTS triggers see an update rather than a
/// silent replace. Messages past the new message count are removed.
pub fn save_session_tx(tx: &Transaction<'_>, normalized: &NormalizedSession) -> Result<(), IndexError> {
    upsert_session_row_tx(tx, &normalized.session)?;

    let mut upsert_message = tx.prepare(UPSERT_MESSAGE_SQL)?;
    for message in &normalized.messages {
        upsert_message.execute(params![
            &message.session_id,
            message.message_index,
            &message.role,
            &message.content,
            &message.thinking,
            &message.timestamp,
            &message.uuid,
            &message.parent_uuid,
            &message.model,
            &message.record_type,
            &message.tool_names,
            &message.tool_use_id,
            message.is_tool_result,
            message.is_sidechain,
            message.input_tokens,
            message.output_tokens,
            message.cache_read_tokens,
            message.cache_create_tokens,
            &message.stop_reason,
            message.duration_ms,
        ])?;
    }

    tx.execute(
        "DELETE FROM messages WHERE session_id = ?1 AND message_index >= ?2",
        params![normalized.session_id(), normalized.messages.len() as i64],
    )?;

    Ok(())
}

fn upsert_session_row_tx(tx: &Transaction<'_>, row: &SessionRow) -> Result<(), IndexError> {
    tx.execute(
        "INSERT INTO sessions (
            session_id,
            project,
            cwd,
            client_version,
            permission_mode,
            models,
            summary,
            custom_title,
            start_time,
            end_time,
            message_count,
            user_message_count,
            assistant_message_count,
            total_input_tokens,
            total_output_tokens,
            total_tokens,
            file_path,
            file_size_bytes,
            source
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        ON CONFLICT(session_id) DO UPDATE SET
            project = excluded.project,
            cwd = excluded.cwd,
            client_version = excluded.client_version,
            permission_mode = excluded.permission_mode,
            models = excluded.models,
            summary = excluded.summary,
            custom_title = excluded.custom_title,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            message_count = excluded.message_count,
            user_message_count = excluded.user_message_count,
            assistant_message_count = excluded.assistant_message_count,
            total_input_tokens = excluded.total_input_tokens,
            total_output_tokens = excluded.total_output_tokens,
            total_tokens = excluded.total_tokens,
            file_path = excluded.file_path,
            file_size_bytes = excluded.file_size_bytes,
            source = excluded.source",
        params![
            &row.session_id,
            &row.project,
            &row.cwd,
            &row.client_version,
            &row.permission_mode,
            &row.models,
            &row.summary,
            &row.custom_title,
            &row.start_time,
            &row.end_time,
            row.message_count,
            row.user_message_count,
            row.assistant_message_count,
            row.total_input_tokens,
            row.total_output_tokens,
            row.total_tokens,
            &row.file_path,
            row.file_size_bytes,
            row.source.as_str(),
        ],
    )?;
    Ok(())
}

const UPSERT_MESSAGE_SQL: &str = "INSERT INTO messages (
        session_id,
        message_index,
        role,
        content,
        thinking,
        timestamp,
        uuid,
        parent_uuid,
        model,
        record_type,
        tool_names,
        tool_use_id,
        is_tool_result,
        is_sidechain,
        input_tokens,
        output_tokens,
        cache_read_tokens,
        cache_create_tokens,
        stop_reason,
        duration_ms
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
    ON CONFLICT(session_id, message_index) DO UPDATE SET
        role = excluded.role,
        content = excluded.content,
        thinking = excluded.thinking,
        timestamp = excluded.timestamp,
        uuid = excluded.uuid,
        parent_uuid = excluded.parent_uuid,
        model = excluded.model,
        record_type = excluded.record_type,
        tool_names = excluded.tool_names,
        tool_use_id = excluded.tool_use_id,
        is_tool_result = excluded.is_tool_result,
        is_sidechain = excluded.is_sidechain,
        input_tokens = excluded.input_tokens,
        output_tokens = excluded.output_tokens,
        cache_read_tokens = excluded.cache_read_tokens,
        cache_create_tokens = excluded.cache_create_tokens,
        stop_reason = excluded.stop_reason,
        duration_ms = excluded.duration_ms";

/// Create indexes, the message FTS table and the summary views.
///
/// Safe to call repeatedly: indexes and FTS are created only when missing,
/// views are dropped and recreated.
pub fn finalize_schema(conn: &Connection) -> Result<(), IndexError> {
    let tables = table_names(conn)?;
    let has = |name: &str| tables.iter().any(|table| table == name);

    if has("sessions") && has("messages") {
        conn.execute_batch(INDEXES)?;
    }

    if has("messages") && !has("messages_fts") {
        conn.execute_batch(MESSAGES_FTS)?;
    }

    for view in VIEWS {
        if !view.requires.iter().all(|table| has(table)) {
            tracing::debug!(view = view.name, "skipping view, base table missing");
            continue;
        }
        conn.execute_batch(&format!(
            "DROP VIEW IF EXISTS {name}; CREATE VIEW {name} AS {sql};",
            name = view.name,
            sql = view.sql
        ))?;
    }

    Ok(())
}

pub fn table_names(conn: &Connection) -> Result<Vec<String>, IndexError> {
    schema_names(conn, "table")
}

pub fn view_names(conn: &Connection) -> Result<Vec<String>, IndexError> {
    schema_names(conn, "view")
}

fn schema_names(conn: &Connection, kind: &str) -> Result<Vec<String>, IndexError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")?;
    let rows = stmt.query_map(params![kind], |row| row.get(0))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

/// Column lists of every index on `table`, in index order.
pub fn index_columns(conn: &Connection, table: &str) -> Result<Vec<Vec<String>>, IndexError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", table))?;
    let index_names: Vec<String> = stmt
        .query_map([], |row| row.get(1))?
        .collect::<Result<_, _>>()?;

    let mut indexes = Vec::new();
    for name in index_names {
        let mut info = conn.prepare(&format!("PRAGMA index_info({})", name))?;
        let columns: Vec<String> = info
            .query_map([], |row| row.get(2))?
            .collect::<Result<_, _>>()?;
        indexes.push(columns);
    }
    Ok(indexes)
}
