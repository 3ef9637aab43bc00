//! Delta extraction from data frame payloads
//!
//! A data frame's payload is expected to be a completion chunk whose first
//! choice carries the next content increment. The payload is an opaque text
//! blob and parsing is best effort: any malformed or unexpected shape
//! yields no fragment, and losing one increment is preferable to
//! terminating the whole response.

/// Extract the incremental content field from a data frame payload
///
/// Returns `None` when the payload is not parseable or the content field is
/// absent. Absence is a normal outcome, not a failure path.
pub fn extract_delta(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;

    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_delta_with_content() {
        let payload = r#"{"id":"chatcmpl-123","choices":[{"index":0,"delta":{"content":"Ol"}}]}"#;
        assert_eq!(extract_delta(payload), Some("Ol".to_string()));
    }

    #[test]
    fn test_extract_delta_role_only() {
        let payload = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(extract_delta(payload), None);
    }

    #[test]
    fn test_extract_delta_empty_delta() {
        let payload = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_delta(payload), None);
    }

    #[test]
    fn test_extract_delta_empty_content() {
        let payload = r#"{"choices":[{"delta":{"content":""}}]}"#;
        assert_eq!(extract_delta(payload), Some(String::new()));
    }

    #[test]
    fn test_extract_delta_malformed_json() {
        assert_eq!(extract_delta(r#"{"choices":[{"delta":{"cont"#), None);
    }

    #[test]
    fn test_extract_delta_not_an_object() {
        assert_eq!(extract_delta("42"), None);
        assert_eq!(extract_delta(r#""texto""#), None);
    }

    #[test]
    fn test_extract_delta_no_choices() {
        assert_eq!(extract_delta(r#"{"object":"chat.completion.chunk"}"#), None);
    }
}
