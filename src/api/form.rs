//! URL-encoded bodies with nested key syntax.
//!
//! `a[b]=1` becomes `{"a": {"b": "1"}}`, `a[]=1&a[]=2` becomes an array and
//! a repeated plain key collects its values into an array. Nesting stops
//! after [`MAX_DEPTH`] brackets; the rest of the key becomes one literal
//! segment.

use serde_json::{Map, Value};

/// Deepest bracket nesting expanded into objects
pub const MAX_DEPTH: usize = 5;
/// Most key/value pairs accepted in one body
pub const MAX_PARAMETERS: usize = 1000;

/// Build a JSON object from decoded form pairs
pub fn nest(pairs: Vec<(String, String)>) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in pairs {
        let path = split_key(&key);
        insert(&mut root, &path, value);
    }
    root
}

/// `a[b][]` -> `["a", "b", ""]`; malformed brackets keep the key literal
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key];
    }

    let mut segments = vec![&key[..open]];
    let mut remaining = &key[open..];
    while let Some(stripped) = remaining.strip_prefix('[') {
        if segments.len() > MAX_DEPTH {
            segments.push(remaining);
            return segments;
        }
        let Some(close) = stripped.find(']') else {
            return vec![key];
        };
        segments.push(&stripped[..close]);
        remaining = &stripped[close + 1..];
    }

    if remaining.is_empty() {
        segments
    } else {
        vec![key]
    }
}

fn container_for(rest: &[&str]) -> Value {
    match rest.first() {
        Some(segment) if segment.is_empty() => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

fn fits(value: &Value, rest: &[&str]) -> bool {
    matches!(
        (value, rest.first().map(|s| s.is_empty())),
        (Value::Array(_), Some(true)) | (Value::Object(_), Some(false))
    )
}

fn insert(target: &mut Value, path: &[&str], value: String) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    match target {
        Value::Array(items) => {
            if rest.is_empty() {
                items.push(Value::String(value));
            } else {
                items.push(container_for(rest));
                if let Some(last) = items.last_mut() {
                    insert(last, rest, value);
                }
            }
        }
        Value::Object(map) => {
            if rest.is_empty() {
                match map.get_mut(*head) {
                    Some(Value::Array(items)) => items.push(Value::String(value)),
                    Some(existing) => {
                        let previous = existing.take();
                        *existing = Value::Array(vec![previous, Value::String(value)]);
                    }
                    None => {
                        map.insert(head.to_string(), Value::String(value));
                    }
                }
            } else {
                let child = map
                    .entry(head.to_string())
                    .or_insert_with(|| container_for(rest));
                if !fits(child, rest) {
                    *child = container_for(rest);
                }
                insert(child, rest, value);
            }
        }
        _ => {}
    }
}
