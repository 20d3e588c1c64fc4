use cclog::index::{
    finalize_schema, index_columns, init_schema, open_database, save_session, table_names,
    view_names,
};
use cclog::model::NormalizedSession;
use cclog::normalize::{SessionOrigin, normalize_records};
use rusqlite::Connection;
use serde_json::{Value, json};

fn session(id: &str, turns: &[(&str, &str)]) -> NormalizedSession {
    let records: Vec<Value> = turns
        .iter()
        .enumerate()
        .map(|(i, (role, text))| {
            json!({
                "type": role,
                "sessionId": id,
                "timestamp": format!("2025-06-15T10:00:{:02}Z", i),
                "message": {"role": role, "content": text, "model": "claude-test"},
            })
        })
        .collect();

    let origin = SessionOrigin {
        project: Some("/test".to_string()),
        ..SessionOrigin::default()
    };
    normalize_records(&records, origin).expect("session")
}

fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open memory db");
    init_schema(&conn).expect("schema");
    conn
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).expect("count")
}

#[test]
fn saves_and_reads_back_rows() {
    let mut conn = memory_db();
    save_session(
        &mut conn,
        &session("s1", &[("user", "Hello, can you help?"), ("assistant", "Sure")]),
    )
    .expect("save");

    let (project, message_count, source): (String, i64, String) = conn
        .query_row(
            "SELECT project, message_count, source FROM sessions WHERE session_id = 's1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("session row");
    assert_eq!(project, "/test");
    assert_eq!(message_count, 2);
    assert_eq!(source, "cli");

    let (role, content, is_tool_result): (String, String, bool) = conn
        .query_row(
            "SELECT role, content, is_tool_result FROM messages
             WHERE session_id = 's1' AND message_index = 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("message row");
    assert_eq!(role, "user");
    assert_eq!(content, "Hello, can you help?");
    assert!(!is_tool_result);
}

#[test]
fn reimport_replaces_instead_of_duplicating() {
    let mut conn = memory_db();
    let normalized = session("s1", &[("user", "a"), ("assistant", "b")]);

    save_session(&mut conn, &normalized).expect("first save");
    save_session(&mut conn, &normalized).expect("second save");

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sessions"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM messages"), 2);
}

#[test]
fn shrinking_reimport_drops_stale_messages() {
    let mut conn = memory_db();
    save_session(
        &mut conn,
        &session("s1", &[("user", "a"), ("assistant", "b"), ("user", "c")]),
    )
    .expect("save");
    save_session(&mut conn, &session("s1", &[("user", "a")])).expect("resave");

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM messages"), 1);
    assert_eq!(
        count(&conn, "SELECT message_count FROM sessions WHERE session_id = 's1'"),
        1
    );
}

#[test]
fn keeps_sessions_apart() {
    let mut conn = memory_db();
    save_session(&mut conn, &session("s1", &[("user", "a")])).expect("save s1");
    save_session(&mut conn, &session("s2", &[("user", "b"), ("assistant", "c")]))
        .expect("save s2");

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sessions"), 2);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM messages WHERE session_id = 's2'"),
        2
    );
}

#[test]
fn finalize_adds_indexes_fts_and_views() {
    let mut conn = memory_db();
    save_session(&mut conn, &session("s1", &[("user", "need some help"), ("assistant", "ok")]))
        .expect("save");
    finalize_schema(&conn).expect("finalize");

    let message_indexes = index_columns(&conn, "messages").expect("indexes");
    assert!(message_indexes.contains(&vec!["session_id".to_string()]));
    assert!(message_indexes.contains(&vec!["role".to_string()]));
    let session_indexes = index_columns(&conn, "sessions").expect("indexes");
    assert!(session_indexes.contains(&vec!["project".to_string()]));

    assert!(table_names(&conn).expect("tables").contains(&"messages_fts".to_string()));

    let views = view_names(&conn).expect("views");
    for view in [
        "daily_activity",
        "model_usage",
        "projects_summary",
        "sessions_overview",
        "tool_usage",
    ] {
        assert!(views.contains(&view.to_string()), "missing view {view}");
    }

    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'help'"),
        1
    );
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tool_usage"), 0);
}

#[test]
fn fts_follows_later_saves() {
    let mut conn = memory_db();
    save_session(&mut conn, &session("s1", &[("user", "original words")])).expect("save");
    finalize_schema(&conn).expect("finalize");

    save_session(&mut conn, &session("s1", &[("user", "rewritten text")])).expect("resave");
    save_session(&mut conn, &session("s2", &[("user", "fresh entry")])).expect("save s2");

    let hits = |term: &str| {
        count(
            &conn,
            &format!("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH '{term}'"),
        )
    };
    assert_eq!(hits("original"), 0);
    assert_eq!(hits("rewritten"), 1);
    assert_eq!(hits("fresh"), 1);
}

#[test]
fn finalize_is_repeatable() {
    let mut conn = memory_db();
    save_session(&mut conn, &session("s1", &[("user", "a")])).expect("save");

    finalize_schema(&conn).expect("first finalize");
    finalize_schema(&conn).expect("second finalize");

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sessions_overview"), 1);
}

#[test]
fn views_reflect_saved_data() {
    let mut conn = memory_db();
    save_session(&mut conn, &session("s1", &[("user", "a"), ("assistant", "b")])).expect("save");
    finalize_schema(&conn).expect("finalize");

    let title: String = conn
        .query_row("SELECT title FROM sessions_overview", [], |row| row.get(0))
        .expect("overview");
    assert_eq!(title, "s1");

    let (model, messages): (String, i64) = conn
        .query_row("SELECT model, message_count FROM model_usage", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("model usage");
    assert_eq!(model, "claude-test");
    assert_eq!(messages, 2);

    let day: String = conn
        .query_row("SELECT day FROM daily_activity", [], |row| row.get(0))
        .expect("daily");
    assert_eq!(day, "2025-06-15");
}

#[test]
fn open_database_creates_file_in_wal_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.db");

    let conn = open_database(&path).expect("open");
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(mode, "wal");
    assert!(path.exists());
    assert!(table_names(&conn).expect("tables").contains(&"sessions".to_string()));
}
