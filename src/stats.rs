//! Summary statistics read back from an imported database.
//!
//! # Key Functions
//!
//! - [`load_stats`]: Session/message/token totals, top projects and models,
//!   and the covered date range

use crate::index::{IndexError, table_names};
use rusqlite::Connection;

const TOP_LIMIT: i64 = 10;

#[derive(Debug, serde::Serialize)]
pub struct StatsReport {
    pub session_count: i64,
    pub message_count: i64,
    pub total_tokens: i64,
    pub top_projects: Vec<NamedCount>,
    pub top_models: Vec<NamedCount>,
    pub first_day: Option<String>,
    pub last_day: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct NamedCount {
    pub name: Option<String>,
    pub count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("no sessions table found in database")]
    MissingSessions,
    #[error("sqlite error: {source}")]
    Sqlite { source: rusqlite::Error },
}

impl From<rusqlite::Error> for StatsError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Sqlite { source }
    }
}

impl From<IndexError> for StatsError {
    fn from(source: IndexError) -> Self {
        match source {
            IndexError::Sqlite { source } => Self::Sqlite { source },
        }
    }
}

pub fn load_stats(conn: &Connection) -> Result<StatsReport, StatsError> {
    let tables = table_names(conn)?;
    if !tables.iter().any(|table| table == "sessions") {
        return Err(StatsError::MissingSessions);
    }

    let (session_count, total_tokens): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(total_tokens), 0) FROM sessions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let message_count: i64 = if tables.iter().any(|table| table == "messages") {
        conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?
    } else {
        0
    };

    let top_projects = named_counts(
        conn,
        "SELECT project, COUNT(*) AS c FROM sessions
         GROUP BY project
         ORDER BY c DESC
         LIMIT ?1",
    )?;

    let top_models = if message_count > 0 {
        named_counts(
            conn,
            "SELECT model, COUNT(*) AS c FROM messages
             WHERE model IS NOT NULL
             GROUP BY model
             ORDER BY c DESC
             LIMIT ?1",
        )?
    } else {
        Vec::new()
    };

    let (first, last): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(start_time), MAX(end_time) FROM sessions WHERE start_time IS NOT NULL",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(StatsReport {
        session_count,
        message_count,
        total_tokens,
        top_projects,
        top_models,
        first_day: first.map(day_prefix),
        last_day: last.map(day_prefix),
    })
}

fn named_counts(conn: &Connection, sql: &str) -> Result<Vec<NamedCount>, StatsError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([TOP_LIMIT], |row| {
        Ok(NamedCount {
            name: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

/// `YYYY-MM-DD` part of an ISO-8601 timestamp.
fn day_prefix(timestamp: String) -> String {
    timestamp.chars().take(10).collect()
}
