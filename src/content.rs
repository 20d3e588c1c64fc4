//! Flattening of message content into storable text.
//!
//! Message content is either a plain string or a list of typed blocks
//! (`text`, `thinking`, `tool_use`, `tool_result`, `image`, `document`).
//! None of these functions fail: unexpected shapes are stringified so a
//! single odd block never costs the rest of the session.

use crate::config::{BASE64_MIN_CHARS, BASE64_SNIFF_CHARS};
use crate::model::ToolCall;
use serde_json::{Map, Value};

/// Visible text of `content`, with reasoning left out and binary payloads
/// replaced by size placeholders.
pub fn extract_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(block_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => stringify(other),
    }
}

fn block_text(block: &Value) -> Option<String> {
    let Some(object) = block.as_object() else {
        return Some(stringify(block));
    };

    match block_type(object) {
        Some("text") => Some(str_field(object, "text").unwrap_or_default().to_string()),
        Some("thinking") => None,
        Some("tool_use") => Some(format!(
            "[tool_use: {}]",
            str_field(object, "name").unwrap_or_default()
        )),
        Some("tool_result") => Some(
            object
                .get("content")
                .map(replace_base64_content)
                .unwrap_or_default(),
        ),
        Some("image" | "document") => Some(replace_base64_content(block)),
        _ => Some(stringify(block)),
    }
}

/// Reasoning text of every `thinking` block, newline-joined.
///
/// `None` means the content carries no reasoning at all, which callers keep
/// distinct from an empty string.
pub fn extract_thinking(content: Option<&Value>) -> Option<String> {
    let blocks = content?.as_array()?;
    let parts: Vec<&str> = blocks
        .iter()
        .filter_map(Value::as_object)
        .filter(|object| block_type(object) == Some("thinking"))
        .filter_map(|object| str_field(object, "thinking"))
        .filter(|text| !text.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

pub fn extract_tool_calls(content: Option<&Value>) -> Vec<ToolCall> {
    let Some(blocks) = content.and_then(Value::as_array) else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter_map(Value::as_object)
        .filter(|object| block_type(object) == Some("tool_use"))
        .map(|object| ToolCall {
            id: str_field(object, "id").unwrap_or_default().to_string(),
            name: str_field(object, "name").unwrap_or_default().to_string(),
            input: object
                .get("input")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
        .collect()
}

/// Locate the first `tool_result` block.
///
/// Returns `(true, tool_use_id)` when one exists, even if it lacks an id.
pub fn find_tool_result(content: Option<&Value>) -> (bool, Option<String>) {
    let Some(blocks) = content.and_then(Value::as_array) else {
        return (false, None);
    };

    blocks
        .iter()
        .filter_map(Value::as_object)
        .find(|object| block_type(object) == Some("tool_result"))
        .map(|object| (true, str_field(object, "tool_use_id").map(str::to_string)))
        .unwrap_or((false, None))
}

/// Swap inline base64 payloads for a short `[..., ~NKB decoded]` marker.
pub fn replace_base64_content(content: &Value) -> String {
    match content {
        Value::String(text) => {
            if looks_like_base64_blob(text) {
                format!(
                    "[base64 content, ~{} decoded]",
                    decoded_size_kb(text.chars().count())
                )
            } else {
                text.clone()
            }
        }
        Value::Object(object) => {
            base64_placeholder(object).unwrap_or_else(|| stringify(content))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item.as_object() {
                Some(object) => base64_placeholder(object).unwrap_or_else(|| {
                    if block_type(object) == Some("text") {
                        str_field(object, "text").unwrap_or_default().to_string()
                    } else {
                        stringify(item)
                    }
                }),
                None => stringify(item),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => stringify(other),
    }
}

fn looks_like_base64_blob(text: &str) -> bool {
    let head: String = text.chars().take(BASE64_SNIFF_CHARS).collect();
    head.contains("base64") && text.chars().count() > BASE64_MIN_CHARS
}

fn base64_placeholder(block: &Map<String, Value>) -> Option<String> {
    let source = block.get("source")?.as_object()?;
    if str_field(source, "type") != Some("base64") {
        return None;
    }

    let encoded_len = str_field(source, "data")
        .map(|data| data.chars().count())
        .unwrap_or(0);
    let media_type = str_field(source, "media_type").unwrap_or("unknown");
    let block_type = block_type(block).unwrap_or("file");

    Some(format!(
        "[{}: {}, ~{} decoded]",
        block_type,
        media_type,
        decoded_size_kb(encoded_len)
    ))
}

/// Decoded size of `encoded_len` base64 chars, e.g. `"15KB"`.
fn decoded_size_kb(encoded_len: usize) -> String {
    let kb = (encoded_len as f64 * 3.0 / 4.0) / 1024.0;
    format!("{:.0}KB", kb)
}

fn block_type(object: &Map<String, Value>) -> Option<&str> {
    str_field(object, "type")
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// Fallback rendering for shapes nothing else understands.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
