//! Tolerant JSON extraction from LLM output.

use regex::Regex;
use serde_json::Value;

/// Extract a JSON object from LLM output.
///
/// Accepts, in order: raw JSON, JSON fenced by a markdown code block
/// (``` or ```json), or the first balanced-brace substring. Returns `None`
/// when all three fail. The permissiveness is deliberate; CLI tools wrap
/// their output in prose more often than not.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let fence_patterns = [r"(?s)```json\s*(.*?)\s*```", r"(?s)```\s*(.*?)\s*```"];
    for pattern in fence_patterns {
        let re = Regex::new(pattern).expect("fence pattern compiles");
        if let Some(captures) = re.captures(text) {
            if let Some(inner) = captures.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(inner.as_str().trim()) {
                    return Some(value);
                }
            }
        }
    }

    balanced_brace_substring(text)
}

/// Scan for the first substring with balanced braces that parses as JSON.
fn balanced_brace_substring(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            if let Ok(value) =
                                serde_json::from_str::<Value>(&text[s..=i])
                            {
                                return Some(value);
                            }
                            start = None;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    None
}
