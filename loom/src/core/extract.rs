//! Recover a typed value from free-form assistant text.
//!
//! Candidate selection is deterministic: a fenced block tagged `json` wins;
//! otherwise the first balanced `{...}` or `[...]` span (whichever opens
//! first) is taken. A candidate that fails to parse is sanitized once and
//! parsed again. The corrective round-trip with the assistant lives in
//! [`crate::io::assistant::request_structured`].

use serde::de::DeserializeOwned;

use crate::error::LoomError;

const TAG: &str = "```json";
const FENCE: &str = "```";
const PREVIEW_CHARS: usize = 200;

/// Extract a value of type `T` from `text` without calling the assistant.
pub fn extract<T: DeserializeOwned>(text: &str) -> Result<T, LoomError> {
    let candidate = locate_candidate(text).ok_or_else(|| LoomError::Extraction {
        reason: "no JSON candidate in reply".to_string(),
        preview: preview(text),
    })?;
    parse_candidate(candidate).map_err(|err| LoomError::Extraction {
        reason: err.to_string(),
        preview: preview(text),
    })
}

/// Tagged block first, balanced span second.
pub fn locate_candidate(text: &str) -> Option<&str> {
    tagged_block(text).or_else(|| balanced_candidate(text))
}

/// Trimmed interior of the first "```json" fence, if it is closed.
pub fn tagged_block(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let start = lower.find(TAG)? + TAG.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    Some(rest[..end].trim())
}

/// First balanced object or array span, ignoring delimiters inside strings.
pub fn balanced_candidate(text: &str) -> Option<&str> {
    let (start, open) = text.char_indices().find(|(_, c)| *c == '{' || *c == '[')?;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = start + offset + c.len_utf8();
                return Some(&text[start..end]);
            }
        }
    }
    None
}

/// Repair raw control characters inside JSON strings.
///
/// Inside a string a raw `\n`, `\r` or `\r\n` becomes the two-character escape
/// `\n`, tabs are kept and other control characters below 0x20 are dropped.
/// Text outside strings is copied unchanged.
pub fn sanitize(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = candidate.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push(c),
            c if u32::from(c) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Parse as-is, then once more after [`sanitize`].
pub fn parse_candidate<T: DeserializeOwned>(candidate: &str) -> Result<T, serde_json::Error> {
    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str(&sanitize(candidate)),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
