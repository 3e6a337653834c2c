//! Codec for the free-form `history` cell.
//!
//! The cell is plain spreadsheet text, so it can hold a JSON array, a JSON
//! string that was encoded twice, JSON with its quotes still escaped, or text
//! typed in by hand. Decoding always yields an array and never fails;
//! encoding always yields a clean, single-encoded JSON array.

use serde_json::{Map, Value};

/// Ordered history entries. Entries are free-form, usually objects with
/// `date`, `location`, `message` and an optional `completed` flag.
pub type History = Vec<Value>;

/// Serialized form of an empty history.
pub const EMPTY: &str = "[]";

/// A single attempt at turning cell text into JSON. `None` falls through to
/// the next strategy.
pub type ParseStrategy = fn(&str) -> Option<Value>;

/// Strategies tried in order on text that looks like JSON.
pub const PARSE_STRATEGIES: &[(&str, ParseStrategy)] =
    &[("strict", parse_strict), ("forgiving", parse_forgiving)];

/// Decodes a cell value of unknown shape into a history.
pub fn decode(cell: &Value) -> History {
    match cell {
        Value::Array(entries) => entries.clone(),
        Value::String(text) => decode_str(text),
        _ => Vec::new(),
    }
}

/// Decodes raw cell text into a history.
pub fn decode_str(text: &str) -> History {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if !looks_structured(trimmed) {
        return vec![plain_text_entry(trimmed)];
    }

    match PARSE_STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(trimmed))
    {
        Some(value) => into_entries(value),
        None if starts_structured(trimmed) => Vec::new(),
        // Quoted text that merely opens with a bracket is a note, not JSON.
        None => vec![plain_text_entry(trimmed)],
    }
}

/// Encodes a history value for storage in a single cell.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Array(entries) => serialize(entries),
        Value::String(text) => serialize(&decode_str(text)),
        _ => EMPTY.to_string(),
    }
}

/// Wraps free text as the single entry of a history.
pub fn plain_text_entry(message: &str) -> Value {
    let mut entry = Map::new();
    entry.insert("date".into(), Value::String(String::new()));
    entry.insert("location".into(), Value::String(String::new()));
    entry.insert("message".into(), Value::String(message.to_string()));
    Value::Object(entry)
}

/// Plain JSON parse. A JSON string whose contents are themselves JSON is
/// unwrapped once.
pub fn parse_strict(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::String(inner) => serde_json::from_str(inner.trim()).ok(),
        value => Some(value),
    }
}

/// Strips one layer of surrounding quotes and unescapes `\"` before parsing.
pub fn parse_forgiving(text: &str) -> Option<Value> {
    let unescaped = strip_quotes(text).replace("\\\"", "\"");
    serde_json::from_str(unescaped.trim()).ok()
}

fn starts_structured(text: &str) -> bool {
    text.starts_with('[') || text.starts_with('{')
}

fn looks_structured(text: &str) -> bool {
    starts_structured(text) || starts_structured(strip_quotes(text).trim_start())
}

fn strip_quotes(text: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| text.strip_prefix(*quote)?.strip_suffix(*quote))
        .unwrap_or(text)
}

fn into_entries(value: Value) -> History {
    match value {
        Value::Array(entries) => entries,
        _ => Vec::new(),
    }
}

fn serialize(entries: &[Value]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| EMPTY.to_string())
}
