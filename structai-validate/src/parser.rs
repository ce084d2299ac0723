//! Payload decoding.
//!
//! Generators frequently wrap JSON in markdown fences or prose. These helpers
//! locate the first JSON object or array in such text and decode it into a
//! [`Value`] tree.

use serde_json::Value as JsonValue;
use structai_core::Value;

use crate::error::OutputParseError;

/// Extract the JSON portion of `text`.
///
/// Tried in order:
/// - the whole text
/// - a fenced ```` ```json ```` block
/// - any fenced block
/// - the first balanced `{...}` object
/// - the first balanced `[...]` array
///
/// # Example
///
/// ```rust
/// use structai_validate::parser::extract_json_from_text;
///
/// let text = "Here you go:\n```json\n{\"name\": \"Alice\"}\n```";
/// assert_eq!(extract_json_from_text(text).unwrap(), "{\"name\": \"Alice\"}");
/// ```
pub fn extract_json_from_text(text: &str) -> Result<String, OutputParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(OutputParseError::Empty);
    }

    if is_json(text) {
        return Ok(text.to_string());
    }

    if let Some(json) = fenced_block(text, true).or_else(|| fenced_block(text, false)) {
        return Ok(json);
    }

    if let Some(json) = find_balanced(text, '{', '}') {
        return Ok(json);
    }

    if let Some(json) = find_balanced(text, '[', ']') {
        return Ok(json);
    }

    Err(OutputParseError::NoJsonFound)
}

/// Decode a text payload into a [`Value`].
pub fn parse_value_from_text(text: &str) -> Result<Value, OutputParseError> {
    let json = extract_json_from_text(text)?;
    let parsed: JsonValue = serde_json::from_str(&json)?;
    Ok(Value::from(parsed))
}

fn is_json(candidate: &str) -> bool {
    serde_json::from_str::<JsonValue>(candidate).is_ok()
}

/// Content of the first fenced block that parses as JSON.
fn fenced_block(text: &str, json_only: bool) -> Option<String> {
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let newline = after.find('\n')?;
        let info = after[..newline].trim();
        let body_start = &after[newline + 1..];
        let end = body_start.find("```")?;
        let body = body_start[..end].trim();

        let language_ok = !json_only || info.eq_ignore_ascii_case("json");
        if language_ok && is_json(body) {
            return Some(body.to_string());
        }
        rest = &body_start[end + 3..];
    }
    None
}

/// First balanced `open ... close` span that parses as JSON.
///
/// Bracket counting ignores delimiters inside string literals.
fn find_balanced(text: &str, open: char, close: char) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                c if c == open && !in_string => depth += 1,
                c if c == close && !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=start + i];
                        if is_json(candidate) {
                            return Some(candidate.to_string());
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + open.len_utf8();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_pure_json_object() {
        let text = r#"{"name": "test", "value": 42}"#;
        assert_eq!(extract_json_from_text(text).unwrap(), text);
    }

    #[test]
    fn test_extract_pure_json_array() {
        let text = r#"[1, 2, 3]"#;
        assert_eq!(extract_json_from_text(text).unwrap(), text);
    }

    #[test]
    fn test_extract_markdown_json_block() {
        let text = "Here is the result:\n```json\n{\"name\": \"test\"}\n```\nDone!";
        assert_eq!(extract_json_from_text(text).unwrap(), r#"{"name": "test"}"#);
    }

    #[test]
    fn test_extract_markdown_plain_block() {
        let text = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_from_text(text).unwrap(), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_embedded_object() {
        let text = r#"The answer is {"x": 1, "y": 2} and that's it."#;
        assert_eq!(extract_json_from_text(text).unwrap(), r#"{"x": 1, "y": 2}"#);
    }

    #[test]
    fn test_extract_embedded_array() {
        let text = r#"Items: ["a", "b", "c"] are listed."#;
        assert_eq!(extract_json_from_text(text).unwrap(), r#"["a", "b", "c"]"#);
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"Result: {"code": "if (x) { return y; }", "valid": true} ok"#;
        let value = parse_value_from_text(text).unwrap();
        assert_eq!(value.get("valid"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_skips_unbalanced_prefix() {
        let text = r#"not json { oops, then {"a": 1}"#;
        assert_eq!(extract_json_from_text(text).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_first_object_wins() {
        let text = r#"First: {"a": 1}, Second: {"b": 2}"#;
        assert_eq!(extract_json_from_text(text).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_no_json() {
        let err = extract_json_from_text("This is just plain text.").unwrap_err();
        assert!(matches!(err, OutputParseError::NoJsonFound));
    }

    #[test]
    fn test_empty() {
        assert!(matches!(
            extract_json_from_text("   ").unwrap_err(),
            OutputParseError::Empty
        ));
    }

    #[test]
    fn test_parse_value_keeps_numbers_typed() {
        let value = parse_value_from_text(r#"{"age": 30, "score": 9.5}"#).unwrap();
        assert_eq!(value.get("age"), Some(&Value::Int(30)));
        assert_eq!(value.get("score"), Some(&Value::Float(9.5)));
    }

    #[test]
    fn test_looks_like_json() {
        assert!(looks_like_json("{\"key\": \"value\"}"));
        assert!(looks_like_json("[1, 2, 3]"));
        assert!(looks_like_json("```json\n{}\n```"));
        assert!(!looks_like_json("Just plain text"));
    }
}
