//! Locate structured data inside a free-text model reply

use serde::Deserialize;
use serde_json::Value;

/// Return the first well-formed JSON object or array embedded in `reply`.
///
/// Fenced code blocks are tried first, then every `{` / `[` in order. Prose
/// before or after the value is ignored. `None` when nothing parses.
pub fn extract_json(reply: &str) -> Option<Value> {
    if let Some(block) = extract_code_block(reply) {
        if let Some(value) = first_value(block) {
            return Some(value);
        }
    }
    first_value(reply)
}

fn first_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(i, _)| {
            let mut de = serde_json::Deserializer::from_str(&text[i..]);
            Value::deserialize(&mut de).ok()
        })
}

/// Contents of the first ``` fenced block, without the language tag
pub fn extract_code_block(reply: &str) -> Option<&str> {
    let start = reply.find("```")?;
    let after_fence = &reply[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}
