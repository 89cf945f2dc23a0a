//! Value-level coercion of loosely shaped JSON into canonical field forms.
//!
//! Generated protocols arrive with fields that are sometimes strings,
//! sometimes lists and sometimes missing altogether. Everything in this
//! module is total: every input maps to a canonical value and nothing here
//! returns an error.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::domain::protocol::{Differentiation, QuizItem, SafetyBlock};

/// Flattens an arbitrary value into plain text.
///
/// Sequences are joined with newlines, `null` becomes the empty string and
/// scalars are rendered as they would appear in JSON. Objects are kept as
/// their JSON text so no content is silently dropped.
#[must_use]
pub fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(text).collect::<Vec<_>>().join("\n"),
        Value::Object(_) => value.to_string(),
    }
}

/// Coerces an arbitrary value into an ordered sequence of strings.
///
/// A string is split on newlines, so text produced by [`join_lines`] reads
/// back as the original sequence.
#[must_use]
pub fn lines(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(text).collect(),
        Value::String(s) => split_lines(s),
        other => vec![text(other)],
    }
}

/// Joins a sequence into newline-separated text.
#[must_use]
pub fn join_lines(items: &[String]) -> String {
    items.join("\n")
}

/// Splits newline-separated text back into a sequence.
///
/// The empty string is the empty sequence. Windows line endings are
/// tolerated.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Keeps the quiz entries that match exactly one quiz variant.
///
/// Entries with an unknown `tipo`, a missing field, or a field of the wrong
/// type are dropped and logged. Anything that is not a sequence yields no
/// quiz at all.
#[must_use]
pub fn quiz_items(value: &Value) -> Vec<QuizItem> {
    let Value::Array(items) = value else {
        if !value.is_null() {
            warn!("quiz is not a sequence, discarding it");
        }
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match QuizItem::deserialize(item) {
            Ok(quiz_item) => Some(quiz_item),
            Err(e) => {
                warn!(index, error = %e, "dropping malformed quiz item");
                None
            }
        })
        .collect()
}

/// Reads a safety block, falling back to the empty block for non-objects.
#[must_use]
pub fn safety(value: &Value) -> SafetyBlock {
    if value.is_object() {
        SafetyBlock::deserialize(value).unwrap_or_default()
    } else {
        SafetyBlock::default()
    }
}

/// Reads a differentiation block, falling back to the empty block for
/// non-objects.
#[must_use]
pub fn differentiation(value: &Value) -> Differentiation {
    if value.is_object() {
        Differentiation::deserialize(value).unwrap_or_default()
    } else {
        Differentiation::default()
    }
}

pub(crate) fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| text(&value))
}

pub(crate) fn deserialize_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| lines(&value))
}

pub(crate) fn deserialize_quiz<'de, D>(deserializer: D) -> Result<Vec<QuizItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| quiz_items(&value))
}

pub(crate) fn deserialize_safety<'de, D>(deserializer: D) -> Result<SafetyBlock, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| safety(&value))
}

pub(crate) fn deserialize_differentiation<'de, D>(
    deserializer: D,
) -> Result<Differentiation, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| differentiation(&value))
}
