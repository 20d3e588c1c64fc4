//! Turning raw records into session and message rows.
//!
//! Two input shapes are supported:
//!
//! - CLI / browser-export session logs: one record per line, dispatched on
//!   the record's `type` tag ([`normalize_records`], [`process_session`]).
//! - claude.ai web-export conversations: one JSON object per conversation
//!   with a `chat_messages` list ([`normalize_web_conversation`]).
//!
//! Both produce a [`NormalizedSession`]; `None` means the input carried
//! nothing worth storing.

use crate::config::MAX_TEXT_CHARS;
use crate::content::{extract_text, extract_thinking, extract_tool_calls, find_tool_result};
use crate::model::{MessageRow, NormalizedSession, SessionRow, Source};
use crate::parse::{ParseError, load_session_file};
use crate::util::truncate_chars;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// File-level facts the record stream cannot supply.
#[derive(Debug, Clone, Default)]
pub struct SessionOrigin {
    pub file_path: Option<String>,
    pub file_size_bytes: Option<i64>,
    /// Used as the session id when no record names one.
    pub fallback_id: Option<String>,
    pub project: Option<String>,
}

/// Result of processing one session file.
#[derive(Debug)]
pub struct SessionOutcome {
    pub session: Option<NormalizedSession>,
    pub warnings: Vec<String>,
}

/// The web-export archive a conversation was read from.
#[derive(Debug, Clone, Default)]
pub struct ArchiveInfo {
    pub path: Option<String>,
    pub size_bytes: Option<i64>,
}

/// Known values of a record's `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    BrowserMetadata,
    Summary,
    CustomTitle,
    FileHistorySnapshot,
    Turn,
}

impl RecordKind {
    fn of(record: &Value) -> Self {
        match str_field(record, "type") {
            Some("metadata") if str_field(record, "source") == Some("browser_export") => {
                Self::BrowserMetadata
            }
            Some("summary") => Self::Summary,
            Some("custom-title") => Self::CustomTitle,
            Some("file-history-snapshot") => Self::FileHistorySnapshot,
            _ => Self::Turn,
        }
    }
}

/// Running state of a single pass over a CLI session.
#[derive(Debug, Default)]
struct CliAccumulator {
    session_id: Option<String>,
    cwd: Option<String>,
    client_version: Option<String>,
    permission_mode: Option<String>,
    summary: Option<String>,
    custom_title: Option<String>,
    browser: bool,
    models: BTreeSet<String>,
    total_input_tokens: i64,
    total_output_tokens: i64,
    timestamps: Vec<String>,
    messages: Vec<MessageRow>,
}

impl CliAccumulator {
    fn absorb(&mut self, record: &Value) {
        let kind = RecordKind::of(record);

        if kind == RecordKind::BrowserMetadata {
            self.browser = true;
            if let Some(id) = non_empty_str(record, "original_uuid") {
                self.session_id = Some(id);
            }
            self.custom_title = string_field(record, "name");
            return;
        }

        maybe_set(&mut self.session_id, non_empty_str(record, "sessionId"));
        maybe_set(&mut self.cwd, non_empty_str(record, "cwd"));
        maybe_set(&mut self.client_version, non_empty_str(record, "version"));
        maybe_set(
            &mut self.permission_mode,
            non_empty_str(record, "permissionMode"),
        );
        if let Some(timestamp) = non_empty_str(record, "timestamp") {
            self.timestamps.push(timestamp);
        }

        match kind {
            RecordKind::Summary => {
                self.summary = Some(string_field(record, "summary").unwrap_or_default());
            }
            RecordKind::CustomTitle => {
                self.custom_title = Some(string_field(record, "customTitle").unwrap_or_default());
            }
            RecordKind::FileHistorySnapshot => {}
            RecordKind::Turn => self.push_turn(record),
            RecordKind::BrowserMetadata => {}
        }
    }

    fn push_turn(&mut self, record: &Value) {
        let message = record.get("message").filter(|m| m.is_object());
        let message_str = |key: &str| message.and_then(|m| non_empty_str(m, key));

        let record_type = non_empty_str(record, "type");
        let role = message_str("role")
            .or_else(|| record_type.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let raw_content = message
            .and_then(|m| m.get("content"))
            .filter(|content| is_truthy(content))
            .or_else(|| record.get("content"));

        let model = message_str("model");
        if let Some(model) = &model {
            self.models.insert(model.clone());
        }

        let usage = message.and_then(|m| m.get("usage"));
        let input_tokens = usage_count(usage, "input_tokens");
        let output_tokens = usage_count(usage, "output_tokens");
        let cache_read = usage_count(usage, "cache_read_input_tokens");
        let cache_create = usage_count(usage, "cache_creation_input_tokens");
        self.total_input_tokens = self.total_input_tokens.saturating_add(input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(output_tokens);

        let content = extract_text(raw_content);
        let thinking = if role == "assistant" {
            extract_thinking(raw_content)
        } else {
            None
        };

        let tool_names: Vec<String> = extract_tool_calls(raw_content)
            .into_iter()
            .map(|call| call.name)
            .collect();
        let (is_tool_result, tool_use_id) = find_tool_result(raw_content);

        let message_index = self.messages.len() as i64;
        self.messages.push(MessageRow {
            session_id: String::new(),
            message_index,
            role,
            content: truncate_chars(&content, MAX_TEXT_CHARS),
            thinking: thinking.map(|text| truncate_chars(&text, MAX_TEXT_CHARS)),
            timestamp: non_empty_str(record, "timestamp"),
            uuid: string_field(record, "uuid"),
            parent_uuid: string_field(record, "parentUuid"),
            model,
            record_type,
            tool_names: json_list(&tool_names),
            tool_use_id,
            is_tool_result,
            is_sidechain: record
                .get("isSidechain")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            input_tokens: non_zero(input_tokens),
            output_tokens: non_zero(output_tokens),
            cache_read_tokens: non_zero(cache_read),
            cache_create_tokens: non_zero(cache_create),
            stop_reason: non_empty_str(record, "stopReason")
                .or_else(|| message_str("stop_reason")),
            duration_ms: record.get("durationMs").and_then(Value::as_i64),
        });
    }

    fn finish(self, origin: SessionOrigin) -> Option<NormalizedSession> {
        let session_id = self
            .session_id
            .or_else(|| origin.fallback_id.filter(|id| !id.is_empty()))?;

        warn_on_mixed_timestamps(&session_id, &self.timestamps);

        let models: Vec<String> = self.models.into_iter().collect();
        let messages = assign_session_id(self.messages, &session_id);
        let (start_time, end_time) = time_bounds(&self.timestamps);

        let session = SessionRow {
            session_id,
            project: origin.project,
            cwd: self.cwd,
            client_version: self.client_version,
            permission_mode: self.permission_mode,
            models: json_list(&models),
            summary: self.summary,
            custom_title: self.custom_title,
            start_time,
            end_time,
            message_count: messages.len() as i64,
            user_message_count: count_role(&messages, "user"),
            assistant_message_count: count_role(&messages, "assistant"),
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_tokens: self
                .total_input_tokens
                .saturating_add(self.total_output_tokens),
            file_path: origin.file_path,
            file_size_bytes: origin.file_size_bytes,
            source: if self.browser {
                Source::Browser
            } else {
                Source::Cli
            },
        };

        Some(NormalizedSession { session, messages })
    }
}

/// Normalize the records of one CLI or browser-export session.
pub fn normalize_records(records: &[Value], origin: SessionOrigin) -> Option<NormalizedSession> {
    if records.is_empty() {
        return None;
    }

    let mut acc = CliAccumulator::default();
    for record in records {
        acc.absorb(record);
    }
    acc.finish(origin)
}

/// Load and normalize one session file.
pub fn process_session(path: &Path, project: Option<&str>) -> Result<SessionOutcome, ParseError> {
    let loaded = load_session_file(path)?;
    let size = std::fs::metadata(path)
        .map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    let origin = SessionOrigin {
        file_path: Some(path.display().to_string()),
        file_size_bytes: Some(size as i64),
        fallback_id: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string()),
        project: project.map(str::to_string),
    };

    Ok(SessionOutcome {
        session: normalize_records(&loaded.records, origin),
        warnings: loaded.warnings,
    })
}

/// Normalize one conversation of a claude.ai web export.
pub fn normalize_web_conversation(
    conversation: &Value,
    archive: &ArchiveInfo,
) -> Option<NormalizedSession> {
    let session_id = non_empty_str(conversation, "uuid")?;
    let turns = conversation
        .get("chat_messages")
        .and_then(Value::as_array)
        .filter(|turns| !turns.is_empty())?;

    let mut timestamps = Vec::new();
    let mut messages = Vec::with_capacity(turns.len());

    for (index, turn) in turns.iter().enumerate() {
        let role = web_role(str_field(turn, "sender").unwrap_or("unknown"));

        let blocks = turn
            .get("content")
            .filter(|content| content.as_array().is_some_and(|items| !items.is_empty()));
        let (content, thinking) = match blocks {
            Some(blocks) => (extract_text(Some(blocks)), extract_thinking(Some(blocks))),
            None => (string_field(turn, "text").unwrap_or_default(), None),
        };

        let timestamp = non_empty_str(turn, "created_at");
        if let Some(timestamp) = &timestamp {
            timestamps.push(timestamp.clone());
        }

        messages.push(MessageRow {
            session_id: session_id.clone(),
            message_index: index as i64,
            role: role.clone(),
            content: truncate_chars(&content, MAX_TEXT_CHARS),
            thinking: thinking.map(|text| truncate_chars(&text, MAX_TEXT_CHARS)),
            timestamp,
            uuid: string_field(turn, "uuid"),
            parent_uuid: None,
            model: None,
            record_type: Some(role),
            tool_names: None,
            tool_use_id: None,
            is_tool_result: false,
            is_sidechain: false,
            input_tokens: None,
            output_tokens: None,
            cache_read_tokens: None,
            cache_create_tokens: None,
            stop_reason: None,
            duration_ms: None,
        });
    }

    warn_on_mixed_timestamps(&session_id, &timestamps);

    let (start_time, end_time) = if timestamps.is_empty() {
        (
            non_empty_str(conversation, "created_at"),
            non_empty_str(conversation, "updated_at"),
        )
    } else {
        time_bounds(&timestamps)
    };

    let session = SessionRow {
        session_id,
        project: None,
        cwd: None,
        client_version: None,
        permission_mode: None,
        models: None,
        summary: non_empty_str(conversation, "summary"),
        custom_title: non_empty_str(conversation, "name"),
        start_time,
        end_time,
        message_count: messages.len() as i64,
        user_message_count: count_role(&messages, "user"),
        assistant_message_count: count_role(&messages, "assistant"),
        total_input_tokens: 0,
        total_output_tokens: 0,
        total_tokens: 0,
        file_path: archive.path.clone(),
        file_size_bytes: archive.size_bytes,
        source: Source::Web,
    };

    Some(NormalizedSession { session, messages })
}

fn web_role(sender: &str) -> String {
    match sender {
        "human" => "user".to_string(),
        "assistant" => "assistant".to_string(),
        other => other.to_string(),
    }
}

/// Decode a Claude Code project directory name back into a path.
///
/// Claude Code stores `/home/user/app` as `-home-user-app`. Hyphens inside
/// path segments are indistinguishable from separators, so this is a
/// best-effort guess. Names without the leading `-` are returned as-is.
pub fn dir_to_project(dirname: &str) -> String {
    match dirname.strip_prefix('-') {
        Some(rest) => format!("/{}", rest.replace('-', "/")),
        None => dirname.to_string(),
    }
}

/// Whether every timestamp is RFC 3339 with one shared UTC offset, which
/// is what plain string min/max ordering relies on.
pub fn timestamps_comparable(timestamps: &[String]) -> bool {
    let mut offset = None;
    for timestamp in timestamps {
        let Ok(parsed) = OffsetDateTime::parse(timestamp, &Rfc3339) else {
            return false;
        };
        match offset {
            None => offset = Some(parsed.offset()),
            Some(seen) if seen != parsed.offset() => return false,
            Some(_) => {}
        }
    }
    true
}

fn warn_on_mixed_timestamps(session_id: &str, timestamps: &[String]) {
    if !timestamps_comparable(timestamps) {
        tracing::warn!(
            session_id,
            "timestamps differ in format or offset; start/end times may be misordered"
        );
    }
}

fn time_bounds(timestamps: &[String]) -> (Option<String>, Option<String>) {
    (
        timestamps.iter().min().cloned(),
        timestamps.iter().max().cloned(),
    )
}

fn assign_session_id(mut messages: Vec<MessageRow>, session_id: &str) -> Vec<MessageRow> {
    for message in &mut messages {
        message.session_id = session_id.to_string();
    }
    messages
}

fn count_role(messages: &[MessageRow], role: &str) -> i64 {
    messages.iter().filter(|m| m.role == role).count() as i64
}

fn json_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    serde_json::to_string(items).ok()
}

fn usage_count(usage: Option<&Value>, key: &str) -> i64 {
    usage
        .and_then(|u| u.get(key))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn non_zero(count: i64) -> Option<i64> {
    (count != 0).then_some(count)
}

fn maybe_set(target: &mut Option<String>, value: Option<String>) {
    if target.is_none() {
        *target = value;
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    str_field(value, key).map(str::to_string)
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    str_field(value, key)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
