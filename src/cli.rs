use cclog::config::DEFAULT_SESSIONS_DIR;
use cclog::util::expand_home;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cclog")]
#[command(about = "Save Claude Code session transcripts to a SQLite database", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import every session file under a directory
    Sessions(SessionsArgs),
    /// Import a single session file
    Session(SessionArgs),
    /// Import conversations from a claude.ai data export ZIP
    WebExport(WebExportArgs),
    /// Show statistics about an imported database
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
pub struct SessionsArgs {
    pub db_path: PathBuf,
    /// Defaults to ~/.claude/projects
    pub session_dir: Option<PathBuf>,
    /// Include agent-* session files
    #[arg(long)]
    pub include_agents: bool,
    /// Only process the first N files (0 means all)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Parse files but don't write to the database
    #[arg(long)]
    pub dry_run: bool,
    /// Suppress progress output
    #[arg(long)]
    pub silent: bool,
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    pub db_path: PathBuf,
    pub session_file: PathBuf,
    /// Project name for this session
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Debug, Args)]
pub struct WebExportArgs {
    pub db_path: PathBuf,
    pub zip_path: PathBuf,
    /// Suppress progress output
    #[arg(long)]
    pub silent: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    pub db_path: PathBuf,
    #[arg(long)]
    pub json: bool,
}

impl Command {
    pub fn silent(&self) -> bool {
        match self {
            Self::Sessions(args) => args.silent,
            Self::WebExport(args) => args.silent,
            Self::Session(_) | Self::Stats(_) => false,
        }
    }
}

pub fn default_sessions_root() -> PathBuf {
    expand_home(DEFAULT_SESSIONS_DIR)
}
