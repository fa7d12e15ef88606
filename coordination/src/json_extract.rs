//! Tolerant JSON extraction from free-form worker output.
//!
//! Workers are asked for JSON-only replies but sometimes wrap the payload in
//! prose or markdown fences. Try a strict parse first, then fall back to the
//! outermost `{...}` span.

use serde_json::Value;

use crate::error::{CoordError, CoordResult};

pub fn extract_json_payload(raw: &str) -> CoordResult<Value> {
    let text = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            Ok(serde_json::from_str(&text[start..=end])?)
        }
        _ => Err(CoordError::JsonPayloadNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_payload_wrapped_in_prose() {
        let raw = "Sure, here you go:\n{\"a\": 1}\nHope that helps!";
        let value = extract_json_payload(raw).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_clean_json_directly() {
        let value = extract_json_payload("{\"a\": 1}").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn errors_when_no_braces_present() {
        assert!(extract_json_payload("no json here").is_err());
    }
}
