//! Locate a JSON object inside free-form model output
//!
//! Models wrap structured answers in prose and markdown fences. Strategies
//! are tried in order and the first hit wins:
//!
//! 1. a fence labeled `json` (any case)
//! 2. an unlabeled fence whose content starts with `{`
//! 3. the first balanced top-level `{...}` span in the raw text
//!
//! Only the span is returned; decoding is left to the caller.

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Return the JSON payload embedded in `response`, if any
pub fn extract_json(response: &str) -> Option<&str> {
    labeled_fence(response)
        .or_else(|| unlabeled_fence(response))
        .or_else(|| balanced_object(response))
}

fn labeled_fence(response: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with the original
    let start = response.to_ascii_lowercase().find(JSON_FENCE)? + JSON_FENCE.len();
    let end = start + response[start..].find(FENCE)?;
    Some(response[start..end].trim())
}

fn unlabeled_fence(response: &str) -> Option<&str> {
    let start = response.find(FENCE)? + FENCE.len();
    let end = start + response[start..].find(FENCE)?;
    let content = response[start..end].trim();
    content.starts_with('{').then_some(content)
}

/// First `{...}` span whose braces balance. Braces inside string literals
/// are not counted.
fn balanced_object(response: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in response.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &response[s..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
