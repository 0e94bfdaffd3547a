//! Parsing helpers for model replies that are supposed to be JSON.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

fn fence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

/// Return the body of the first fenced block, or the trimmed text when unfenced
pub fn strip_code_fences(text: &str) -> &str {
    fence_pattern()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| text.trim())
}

/// Parse a JSON object out of a reply, tolerating fences and surrounding prose
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Option<T> {
    let body = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }
    // Prose around a bare object: try the outermost braces
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_strips_json_fence() {
        let text = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(strip_code_fences(text), "{\"summary\": \"ok\"}");
    }

    #[test]
    fn test_unfenced_text_is_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let value: Value = parse_json_reply("Here you go:\n{\"a\": 1}\nThanks").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_failure_is_none() {
        assert!(parse_json_reply::<Value>("no json here").is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
