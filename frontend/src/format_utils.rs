//! Text formatting helpers for list cells, badges and generated component ids.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::{Map, Value};

pub const DEFAULT_TRUNCATE_CHARS: usize = 28;

/// Keeps the first `max_chars` characters and appends `...`, whatever the
/// original length.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let kept: String = text.chars().take(max_chars).collect();
    format!("{}...", kept)
}

/// [`truncate`] only when `text` has at least `limit` characters.
pub fn conditional_truncate(text: &str, limit: usize, max_chars: usize) -> String {
    if text.chars().count() >= limit {
        truncate(text, max_chars)
    } else {
        text.to_string()
    }
}

pub fn capitalize_first_letter(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalizes every space separated word. Runs of spaces are preserved.
pub fn capitalize_letters(value: &str) -> String {
    value
        .split(' ')
        .map(capitalize_first_letter)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_as_percentage(value: impl std::fmt::Display, negative: bool) -> String {
    if negative {
        format!("-{}%", value)
    } else {
        format!("{}%", value)
    }
}

/// True when any field is `null` or an empty string. Used to block saving a
/// half-filled form row.
pub fn has_null(fields: &Map<String, Value>) -> bool {
    fields.values().any(|value| match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    })
}

/// Component id of the form `__BID__123456___B_<suffix>__`.
pub fn generate_id(suffix: &str) -> String {
    let digits: u32 = rand::rng().random_range(0..1_000_000);
    format!("__BID__{:06}___B_{}__", digits, suffix)
}

/// Random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
