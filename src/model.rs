use serde_json::Value;

/// Where a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cli,
    Browser,
    Web,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Browser => "browser",
            Self::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub session_id: String,
    pub project: Option<String>,
    pub cwd: Option<String>,
    pub client_version: Option<String>,
    pub permission_mode: Option<String>,
    pub models: Option<String>,
    pub summary: Option<String>,
    pub custom_title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub message_count: i64,
    pub user_message_count: i64,
    pub assistant_message_count: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_tokens: i64,
    pub file_path: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub session_id: String,
    pub message_index: i64,
    pub role: String,
    pub content: String,
    pub thinking: Option<String>,
    pub timestamp: Option<String>,
    pub uuid: Option<String>,
    pub parent_uuid: Option<String>,
    pub model: Option<String>,
    pub record_type: Option<String>,
    pub tool_names: Option<String>,
    pub tool_use_id: Option<String>,
    pub is_tool_result: bool,
    pub is_sidechain: bool,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cache_read_tokens: Option<i64>,
    pub cache_create_tokens: Option<i64>,
    pub stop_reason: Option<String>,
    pub duration_ms: Option<i64>,
}

/// One `tool_use` block lifted out of message content.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A session row together with the message rows it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSession {
    pub session: SessionRow,
    pub messages: Vec<MessageRow>,
}

impl NormalizedSession {
    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }
}
