use serde_json::Value;

const PREVIEW_LEN: usize = 300;

/// Short correlation id for tying together the log lines of one call.
pub fn new_cid() -> String {
    uuid::Uuid::new_v4().to_simple().to_string()[..8].to_string()
}

/// Truncates `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Compact JSON preview for log fields.
pub fn preview(value: &Value) -> String {
    truncate(&value.to_string(), PREVIEW_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cid_is_short_hex() {
        let cid = new_cid();
        assert_eq!(cid.len(), 8);
        assert!(cid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(cid, new_cid());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }

    #[test]
    fn preview_caps_long_payloads() {
        let big = json!({"text": "x".repeat(1000)});
        assert!(preview(&big).len() <= PREVIEW_LEN + 3);
    }
}
