mod cli;

use cclog::config::ImportOptions;
use cclog::index::open_database;
use cclog::scan::{ImportReport, import_session_file, import_sessions};
use cclog::stats::load_stats;
use cclog::web::import_web_export;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.command.silent());

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(silent: bool) {
    let filter = if silent {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns `Ok(false)` when the command ran but some items failed.
fn run(cli: cli::Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        cli::Command::Sessions(args) => handle_sessions(args),
        cli::Command::Session(args) => handle_session(args),
        cli::Command::WebExport(args) => handle_web_export(args),
        cli::Command::Stats(args) => handle_stats(args),
    }
}

fn handle_sessions(args: cli::SessionsArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let root = match args.session_dir {
        Some(dir) => dir,
        None => {
            let root = cli::default_sessions_root();
            if !root.is_dir() {
                return Err(format!(
                    "default session directory not found: {}\nplease provide a path to your session files",
                    root.display()
                )
                .into());
            }
            root
        }
    };

    let options = ImportOptions {
        include_agents: args.include_agents,
        limit: args.limit,
    };

    let report = if args.dry_run {
        import_sessions(None, &root, &options)?
    } else {
        let mut conn = open_database(&args.db_path)?;
        import_sessions(Some(&mut conn), &root, &options)?
    };

    if !args.silent {
        print_report(&report, "sessions");
        if !args.dry_run {
            print_db_size(&args.db_path);
        }
    }
    Ok(!report.has_errors())
}

fn handle_session(args: cli::SessionArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let mut conn = open_database(&args.db_path)?;
    let imported = import_session_file(&mut conn, &args.session_file, args.project.as_deref())?;
    println!(
        "Imported session {}: {} messages",
        imported.session_id, imported.messages
    );
    Ok(true)
}

fn handle_web_export(args: cli::WebExportArgs) -> Result<bool, Box<dyn std::error::Error>> {
    tracing::info!(path = %args.zip_path.display(), "loading web export");
    let mut conn = open_database(&args.db_path)?;
    let report = import_web_export(&mut conn, &args.zip_path)?;

    if !args.silent {
        print_report(&report, "conversations");
        print_db_size(&args.db_path);
    }
    Ok(!report.has_errors())
}

fn handle_stats(args: cli::StatsArgs) -> Result<bool, Box<dyn std::error::Error>> {
    if !args.db_path.is_file() {
        return Err(format!("database not found: {}", args.db_path.display()).into());
    }
    let conn = rusqlite::Connection::open(&args.db_path)?;
    let stats = load_stats(&conn)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(true);
    }

    println!("Sessions:  {}", stats.session_count);
    println!("Messages:  {}", stats.message_count);
    println!("Tokens:    {}", stats.total_tokens);

    if !stats.top_projects.is_empty() {
        println!("\nTop projects:");
        for project in &stats.top_projects {
            println!(
                "  {:>5}  {}",
                project.count,
                project.name.as_deref().unwrap_or("(none)")
            );
        }
    }

    if !stats.top_models.is_empty() {
        println!("\nTop models:");
        for model in &stats.top_models {
            println!(
                "  {:>7}  {}",
                model.count,
                model.name.as_deref().unwrap_or("(none)")
            );
        }
    }

    if let Some(first) = &stats.first_day {
        let last = stats.last_day.as_deref().unwrap_or("?");
        println!("\nDate range: {} to {}", first, last);
    }

    Ok(true)
}

fn print_report(report: &ImportReport, unit: &str) {
    println!(
        "\n{} {}, {} messages",
        report.sessions, unit, report.messages
    );
    if report.warnings > 0 {
        println!("{} warnings", report.warnings);
    }
    if report.has_errors() {
        eprintln!("{} errors", report.errors.len());
        for item in &report.errors {
            eprintln!("  {}: {}", item.source, item.error);
        }
    }
}

fn print_db_size(db_path: &Path) {
    if let Ok(meta) = std::fs::metadata(db_path) {
        let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
        println!("Database: {} ({:.1} MB)", db_path.display(), size_mb);
    }
}
