//! Normalization of loosely-shaped prompt and message payloads into text.
//!
//! Registries and models hand back content as a bare string, an object with a
//! `content` or `text` field, or a list of such parts. Everything funnels
//! through [`PromptPayload`] and is flattened by [`coerce_to_text`], which
//! never fails.

use std::collections::BTreeMap;

use serde_json::Value;

/// A payload of unknown shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    Text(String),
    Parts(Vec<PromptPayload>),
    Nested(BTreeMap<String, PromptPayload>),
}

impl From<Value> for PromptPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Null => Self::Text(String::new()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::Array(items) => Self::Parts(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Nested(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for PromptPayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PromptPayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Flatten a payload to plain text.
///
/// Lists yield their first element. Objects yield their `content` field,
/// or failing that their `text` field. Anything else is empty.
pub fn coerce_to_text(payload: &PromptPayload) -> String {
    match payload {
        PromptPayload::Text(s) => s.clone(),
        PromptPayload::Parts(parts) => parts.first().map(coerce_to_text).unwrap_or_default(),
        PromptPayload::Nested(map) => map
            .get("content")
            .or_else(|| map.get("text"))
            .map(coerce_to_text)
            .unwrap_or_default(),
    }
}

/// Flatten a payload keeping every list element, joined by newlines.
///
/// Empty pieces are dropped so the join never produces blank lines from
/// non-text parts.
pub fn join_parts(payload: &PromptPayload) -> String {
    match payload {
        PromptPayload::Parts(parts) => parts
            .iter()
            .map(join_parts)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        PromptPayload::Nested(map) => match map.get("content").or_else(|| map.get("text")) {
            Some(inner) => join_parts(inner),
            None => String::new(),
        },
        PromptPayload::Text(s) => s.clone(),
    }
}
