// src/agent/response.rs

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::prompt::SCRIPT_MARKER;
use crate::model::{Assumption, AssumptionCategory, Confidence};

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\n?(.*?)\n?```").expect("json block regex"));
static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[\w+-]*[ \t]*\r?\n?").expect("fence regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```\s*$").expect("closing fence regex"));

/// Strips code fences and normalizes line endings to `\n`.
pub fn clean_llm_output(response: &str) -> String {
    let content = response.trim();
    let content = LEADING_FENCE.replace(content, "");
    let content = TRAILING_FENCE.replace(&content, "");
    content
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

fn field<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry[key].as_str().unwrap_or_default()
}

fn parse_assumptions(block: &str) -> Vec<Assumption> {
    let payload: Value = match serde_json::from_str(block) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(%err, "ignoring malformed assumptions block");
            return Vec::new();
        }
    };

    let Some(entries) = payload["assumptions"].as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| Assumption {
            category: AssumptionCategory::parse(entry["category"].as_str().unwrap_or("other")),
            description: field(entry, "description").to_string(),
            assumed_value: field(entry, "assumed_value").to_string(),
            reasoning: field(entry, "reasoning").to_string(),
            confidence: Confidence::parse(entry["confidence"].as_str().unwrap_or("medium")),
        })
        .collect()
}

/// Splits a model reply into the deck and its assumptions.
///
/// The deck starts at [`SCRIPT_MARKER`] when present, otherwise it is
/// whatever follows the JSON block, otherwise the whole reply. A malformed
/// assumptions block yields no assumptions.
pub fn parse_llm_response(response: &str) -> (String, Vec<Assumption>) {
    let json_block = JSON_BLOCK.captures(response);
    let assumptions = json_block
        .as_ref()
        .and_then(|caps| caps.get(1))
        .map(|block| parse_assumptions(block.as_str()))
        .unwrap_or_default();

    let script = if let Some(idx) = response.find(SCRIPT_MARKER) {
        response[idx..].trim().to_string()
    } else if let Some(whole) = json_block.as_ref().and_then(|caps| caps.get(0)) {
        let after = response[whole.end()..].trim();
        let after = LEADING_FENCE.replace(after, "");
        TRAILING_FENCE.replace(&after, "").trim().to_string()
    } else {
        response.to_string()
    };

    (clean_llm_output(&script), assumptions)
}
