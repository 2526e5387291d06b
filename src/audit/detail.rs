use serde_json::{Map, Value};

use super::model::DetailLevel;

const MEDIUM_STRING_LIMIT: usize = 256;

pub(crate) fn apply_detail_level(level: DetailLevel, metadata: Value) -> Value {
    match level {
        DetailLevel::Full => metadata,
        DetailLevel::Minimal => Value::Object(Map::new()),
        DetailLevel::Medium => {
            let Value::Object(fields) = metadata else {
                return Value::Object(Map::new());
            };

            let kept = fields
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(text) => {
                        Some((key, Value::String(truncate_chars(&text, MEDIUM_STRING_LIMIT))))
                    }
                    Value::Bool(_) | Value::Number(_) | Value::Null => Some((key, value)),
                    Value::Array(_) | Value::Object(_) => None,
                })
                .collect::<Map<_, _>>();
            Value::Object(kept)
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
