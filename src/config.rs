//! Fixed limits and matching rules shared across the import pipeline.
//!
//! Everything here is a compile-time constant; runtime choices come from
//! CLI flags and end up in [`ImportOptions`].

/// Hard cap applied to stored `content` and `thinking` text, in chars.
pub const MAX_TEXT_CHARS: usize = 100_000;

/// Largest decompressed `conversations.json` accepted from a web export.
pub const MAX_MANIFEST_BYTES: u64 = 500 * 1024 * 1024;

/// Suffix identifying the conversation manifest inside a web-export ZIP.
pub const WEB_MANIFEST_NAME: &str = "conversations.json";

/// Wrapper key of single-document session files.
pub const LOGLINES_KEY: &str = "loglines";

/// Literal openings of the two record shapes found in concatenated lines.
pub const RECOVERY_MARKERS: [&str; 2] = ["{\"parentUuid\"", "{\"type\":"];

/// Directory segments whose files never hold primary sessions.
pub const SKIPPED_DIR_MARKERS: [&str; 3] = ["/subagent/", "/subagents/", "/processing/"];

/// Name fragments marking editor backups and duplicated downloads.
pub const SKIPPED_NAME_MARKERS: [&str; 3] = [".backup", " copy", "(1)"];

/// Metadata files living next to sessions.
pub const SKIPPED_FILE_NAMES: [&str; 2] = ["sessions-index.json", "timeline.json"];

pub const TIMELINES_MARKER: &str = ".timelines";

pub const AGENT_FILE_PREFIX: &str = "agent-";

/// Session file extensions picked up by discovery.
pub const SESSION_EXTENSIONS: [&str; 2] = ["jsonl", "json"];

/// Base64 sniffing: marker must appear within this many leading chars.
pub const BASE64_SNIFF_CHARS: usize = 500;

/// Base64 sniffing: strings at or below this length are never replaced.
pub const BASE64_MIN_CHARS: usize = 1000;

/// Log a progress line every this many files.
pub const PROGRESS_EVERY: usize = 100;

/// Where Claude Code keeps per-project session logs.
pub const DEFAULT_SESSIONS_DIR: &str = "~/.claude/projects";

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Keep `agent-*` files that are skipped by default.
    pub include_agents: bool,
    /// Only process the first N discovered files. `Some(0)` means all.
    pub limit: Option<usize>,
}
