//! Message predicates.
//!
//! Key and value filters are exact matches. The JSON field filter is a
//! substring match on the stringified top-level field. Filters are ANDed and
//! absent filters always pass.

use serde_json::Value;

use crate::inspector::message::{Message, MessageFilter};

pub fn matches(msg: &Message, filter: &MessageFilter) -> bool {
    key_matches(msg, filter) && value_matches(msg, filter) && json_field_matches(msg, filter)
}

fn active(f: &Option<String>) -> Option<&str> {
    f.as_deref().filter(|s| !s.is_empty())
}

fn key_matches(msg: &Message, filter: &MessageFilter) -> bool {
    match active(&filter.key_filter) {
        Some(expected) => msg.key.as_deref() == Some(expected),
        None => true,
    }
}

fn value_matches(msg: &Message, filter: &MessageFilter) -> bool {
    match active(&filter.value_filter) {
        Some(expected) => msg.value == expected,
        None => true,
    }
}

fn json_field_matches(msg: &Message, filter: &MessageFilter) -> bool {
    let (Some(field), Some(needle)) = (active(&filter.json_key_filter), active(&filter.json_value_filter)) else {
        return true;
    };

    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&msg.value) else {
        return false;
    };

    match map.get(field) {
        Some(found) => stringify(found).contains(needle),
        None => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
