//! # Best-Effort Structured Decode
//!
//! Model responses are supposed to be JSON but routinely arrive wrapped in
//! markdown fences, preceded by chatter, or truncated. Every call site that
//! expects structure goes through [`decode_json`] and handles the
//! [`Decoded::Malformed`] arm with a typed default instead of propagating a
//! parse error.

use serde::de::DeserializeOwned;

/// Outcome of a best-effort decode: either the typed value or the raw text.
#[derive(Debug, Clone)]
pub enum Decoded<T> {
    Parsed(T),
    Malformed(String),
}

impl<T> Decoded<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }
}

/// Decode model output into `T`, tolerating fences and surrounding chatter.
///
/// Strategy, in order: direct parse, fence-stripped parse, first balanced
/// `{...}` / `[...]` slice. Anything else is `Malformed(raw)`.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Decoded<T> {
    if let Ok(v) = serde_json::from_str::<T>(raw.trim()) {
        return Decoded::Parsed(v);
    }
    let stripped = strip_fences(raw);
    if let Ok(v) = serde_json::from_str::<T>(stripped.trim()) {
        return Decoded::Parsed(v);
    }
    if let Some(slice) = balanced_json_slice(&stripped) {
        if let Ok(v) = serde_json::from_str::<T>(slice) {
            return Decoded::Parsed(v);
        }
    }
    Decoded::Malformed(raw.to_string())
}

/// Strip a leading/trailing markdown code fence, keeping the body.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.to_string(),
    };
    match without_open.rfind("```") {
        Some(idx) => without_open[..idx].trim().to_string(),
        None => without_open.trim().to_string(),
    }
}

/// Find the first balanced top-level JSON object or array in `text`.
///
/// Tracks string/escape state so braces inside string literals do not skew
/// the depth count.
fn balanced_json_slice(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find(['{', '['])?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// De-conversationalize a coder response down to code.
///
/// Concatenates all fenced code blocks; when the response carries no fences
/// at all it is assumed to be bare code and returned trimmed.
pub fn extract_code(raw: &str) -> String {
    let re = regex::Regex::new(r"(?s)```[a-zA-Z0-9_+-]*\n(.*?)```");
    let Ok(re) = re else {
        return raw.trim().to_string();
    };
    let blocks: Vec<String> = re
        .captures_iter(raw)
        .map(|c| c[1].trim_end().to_string())
        .collect();
    if blocks.is_empty() {
        raw.trim().to_string()
    } else {
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        verdict: String,
    }

    #[test]
    fn test_direct_parse() {
        let d = decode_json::<Verdict>(r#"{"verdict": "pass"}"#);
        assert!(d.is_parsed());
    }

    #[test]
    fn test_fenced_parse() {
        let raw = "```json\n{\"verdict\": \"pass\"}\n```";
        match decode_json::<Verdict>(raw) {
            Decoded::Parsed(v) => assert_eq!(v.verdict, "pass"),
            Decoded::Malformed(_) => panic!("should parse fenced JSON"),
        }
    }

    #[test]
    fn test_embedded_object() {
        let raw = "Sure! Here is the verdict:\n{\"verdict\": \"fail\"}\nLet me know.";
        match decode_json::<Verdict>(raw) {
            Decoded::Parsed(v) => assert_eq!(v.verdict, "fail"),
            Decoded::Malformed(_) => panic!("should extract embedded object"),
        }
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"noise {"verdict": "pa}ss"} trailing"#;
        assert!(decode_json::<Verdict>(raw).is_parsed());
    }

    #[test]
    fn test_malformed_keeps_raw() {
        let raw = "I could not produce JSON, sorry.";
        match decode_json::<Verdict>(raw) {
            Decoded::Malformed(kept) => assert_eq!(kept, raw),
            Decoded::Parsed(_) => panic!("free text must be malformed"),
        }
    }

    #[test]
    fn test_extract_code_from_fences() {
        let raw = "Here you go:\n```tsx\nconst a = 1;\n```\nand also\n```\nconst b = 2;\n```";
        let code = extract_code(raw);
        assert!(code.contains("const a = 1;"));
        assert!(code.contains("const b = 2;"));
        assert!(!code.contains("Here you go"));
    }

    #[test]
    fn test_extract_code_unfenced_passthrough() {
        assert_eq!(extract_code("  const a = 1;\n"), "const a = 1;");
    }
}
