use cclog::config::ImportOptions;
use cclog::index::{open_database, view_names};
use cclog::scan::{
    ScanError, collect_session_files, import_session_file, import_sessions, project_for,
    should_skip_file,
};
use std::path::Path;

const SESSION_LINE: &str = r#"{"type":"user","timestamp":"2025-01-01T00:00:00Z","message":{"role":"user","content":"hi"}}"#;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dirs");
    }
    std::fs::write(path, format!("{}\n", SESSION_LINE)).expect("write session");
}

fn names(files: &[std::path::PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn discovery_skips_agents_unless_asked() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("proj/main-session.jsonl"));
    touch(&dir.path().join("proj/agent-abc123.jsonl"));

    let files = collect_session_files(dir.path(), false).expect("collect");
    assert_eq!(names(&files), vec!["main-session.jsonl"]);

    let files = collect_session_files(dir.path(), true).expect("collect");
    assert_eq!(files.len(), 2);
}

#[test]
fn discovery_skips_copies_backups_and_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("proj/real.jsonl"));
    touch(&dir.path().join("proj/real.jsonl.backup.jsonl"));
    touch(&dir.path().join("proj/real copy.jsonl"));
    touch(&dir.path().join("proj/real(1).jsonl"));
    touch(&dir.path().join("proj/sessions-index.json"));
    touch(&dir.path().join("proj/timeline.json"));
    touch(&dir.path().join("proj/.timelines/t.jsonl"));
    touch(&dir.path().join("proj/notes.txt"));

    let files = collect_session_files(dir.path(), false).expect("collect");
    assert_eq!(names(&files), vec!["real.jsonl"]);
}

#[test]
fn discovery_skips_subagent_and_processing_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("proj/top.jsonl"));
    touch(&dir.path().join("proj/subagents/worker.jsonl"));
    touch(&dir.path().join("proj/subagent/worker.jsonl"));
    touch(&dir.path().join("processing/queued.jsonl"));

    let files = collect_session_files(dir.path(), true).expect("collect");
    assert_eq!(names(&files), vec!["top.jsonl"]);
}

#[test]
fn discovery_finds_both_extensions_in_path_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("b/second.json"));
    touch(&dir.path().join("a/first.jsonl"));

    let files = collect_session_files(dir.path(), false).expect("collect");
    assert_eq!(names(&files), vec!["first.jsonl", "second.json"]);
}

#[test]
fn skip_rules_on_plain_paths() {
    assert!(should_skip_file(Path::new("/p/agent-1.jsonl"), false));
    assert!(!should_skip_file(Path::new("/p/agent-1.jsonl"), true));
    assert!(should_skip_file(Path::new("/p/x/subagents/a.jsonl"), true));
    assert!(should_skip_file(Path::new("/p/.timelines/a.jsonl"), true));
    assert!(!should_skip_file(Path::new("/p/session.jsonl"), false));
}

#[test]
fn project_labels_come_from_first_directory() {
    let root = Path::new("/data/projects");
    assert_eq!(
        project_for(root, Path::new("/data/projects/-home-user-app/s.jsonl")),
        "/home/user/app"
    );
    assert_eq!(
        project_for(root, Path::new("/data/projects/plain/deep/s.jsonl")),
        "plain"
    );
    assert_eq!(project_for(root, Path::new("/data/projects/s.jsonl")), "default");
    assert_eq!(project_for(root, Path::new("/elsewhere/s.jsonl")), "unknown");
}

#[test]
fn dry_run_counts_without_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("projects");
    touch(&root.join("-home-user-app/one.jsonl"));
    touch(&root.join("-home-user-app/two.jsonl"));

    let report = import_sessions(None, &root, &ImportOptions::default()).expect("dry run");
    assert_eq!(report.files, 2);
    assert_eq!(report.sessions, 2);
    assert_eq!(report.messages, 2);
    assert!(!report.has_errors());
    assert!(!dir.path().join("out.db").exists());
}

#[test]
fn import_writes_sessions_and_finalizes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("projects");
    touch(&root.join("-home-user-app/one.jsonl"));
    touch(&root.join("loose.jsonl"));
    let mut conn = open_database(&dir.path().join("out.db")).expect("open");

    let report = import_sessions(Some(&mut conn), &root, &ImportOptions::default())
        .expect("import");
    assert_eq!(report.sessions, 2);

    let project: String = conn
        .query_row(
            "SELECT project FROM sessions WHERE session_id = 'one'",
            [],
            |row| row.get(0),
        )
        .expect("project");
    assert_eq!(project, "/home/user/app");

    let project: String = conn
        .query_row(
            "SELECT project FROM sessions WHERE session_id = 'loose'",
            [],
            |row| row.get(0),
        )
        .expect("project");
    assert_eq!(project, "default");

    assert!(view_names(&conn).expect("views").contains(&"sessions_overview".to_string()));
}

#[test]
fn limit_caps_processed_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("p/a.jsonl"));
    touch(&dir.path().join("p/b.jsonl"));
    touch(&dir.path().join("p/c.jsonl"));

    let options = ImportOptions {
        limit: Some(2),
        ..ImportOptions::default()
    };
    let report = import_sessions(None, dir.path(), &options).expect("dry run");
    assert_eq!(report.files, 2);
}

#[test]
fn broken_file_is_reported_and_run_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("p/good.jsonl"));
    std::fs::write(dir.path().join("p/bad.json"), "{\"loglines\": [").expect("write");

    let report = import_sessions(None, dir.path(), &ImportOptions::default()).expect("dry run");
    assert_eq!(report.sessions, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].source.ends_with("bad.json"));
}

#[test]
fn empty_root_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("p/agent-only.jsonl"));

    let err = import_sessions(None, dir.path(), &ImportOptions::default()).expect_err("must fail");
    assert!(matches!(err, ScanError::NoSessionFiles { .. }));
}

#[test]
fn single_file_import_reports_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut conn = open_database(&dir.path().join("one.db")).expect("open");

    let imported = import_session_file(
        &mut conn,
        Path::new("tests/fixtures/cli_session.jsonl"),
        Some("/my/project"),
    )
    .expect("import");
    assert_eq!(imported.session_id, "abc-123");
    assert_eq!(imported.messages, 2);

    let empty = dir.path().join("empty.jsonl");
    std::fs::write(&empty, "").expect("write");
    let err = import_session_file(&mut conn, &empty, None).expect_err("must fail");
    assert!(matches!(err, ScanError::NoData { .. }));
}

#[test]
fn zero_limit_means_no_limit() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("p/a.jsonl"));
    touch(&dir.path().join("p/b.jsonl"));

    let options = ImportOptions {
        limit: Some(0),
        ..ImportOptions::default()
    };
    let report = import_sessions(None, dir.path(), &options).expect("dry run");
    assert_eq!(report.files, 2);
}

#[cfg(unix)]
#[test]
fn unreadable_subdirectory_does_not_stop_the_run() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("open/visible.jsonl"));
    let locked = dir.path().join("locked");
    touch(&locked.join("hidden.jsonl"));
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
        .expect("lock dir");

    let result = import_sessions(None, dir.path(), &ImportOptions::default());

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
        .expect("unlock dir");

    // root ignores permission bits, so the locked file may still be found
    let report = result.expect("import continues");
    assert!(report.sessions >= 1);
    assert!(!report.has_errors());
}

#[test]
fn missing_root_is_a_walk_error() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = collect_session_files(&dir.path().join("absent"), false).expect_err("must fail");
    assert!(matches!(err, ScanError::Walk { .. }));
}
