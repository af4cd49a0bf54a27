// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

use chrono::{Datelike, NaiveDate};

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Anchors the model to the real date so "recent" means recent.
/// Renders as `Today is January 18th, 2026.`
pub fn date_anchor(today: NaiveDate) -> String {
    format!(
        "Today is {} {}{}, {}.",
        today.format("%B"),
        today.day(),
        ordinal_suffix(today.day()),
        today.year()
    )
}

/// Replaces `{name}` placeholders in one left-to-right pass. Substituted
/// values are never rescanned, so user text that happens to contain a
/// placeholder stays literal. Unknown `{...}` sequences are kept as-is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let inner = &rest[open + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            let after = inner.strip_prefix(name)?.strip_prefix('}')?;
            Some((after, *value))
        });
        match hit {
            Some((after, value)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = inner;
            }
        }
    }
    out.push_str(rest);
    out
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
