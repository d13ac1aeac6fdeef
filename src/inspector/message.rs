use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inspector::error::{InspectorError, Result};

// ==========================================
// MESSAGE
// ==========================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Pretty-printed JSON view of `value`. `None` means "render raw".
    #[serde(default, rename = "format", skip_serializing_if = "Option::is_none")]
    pub decoded_view: Option<String>,
}

impl Message {
    pub fn new(partition: i32, offset: i64, key: Option<String>, value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            partition,
            offset,
            key,
            value: value.into(),
            timestamp,
            headers: BTreeMap::new(),
            decoded_view: None,
        }
    }

    /// Recompute the JSON view. Parse failures leave it empty (DecodeSkipped).
    pub fn decode_view(&mut self) {
        self.decoded_view = pretty_json(&self.value);
    }

    pub fn decoded(mut self) -> Self {
        self.decode_view();
        self
    }

    pub fn clear_view(&mut self) {
        self.decoded_view = None;
    }

    /// Same record, ignoring the derived view.
    pub fn same_record(&self, other: &Message) -> bool {
        self.partition == other.partition
            && self.offset == other.offset
            && self.key == other.key
            && self.value == other.value
            && self.timestamp == other.timestamp
            && self.headers == other.headers
    }
}

/// Re-serializes `raw` with four-space indentation if it parses as JSON.
pub fn pretty_json(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let mut out = Vec::with_capacity(raw.len() * 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser).ok()?;
    String::from_utf8(out).ok()
}

// ==========================================
// PARTITION BOUNDS
// ==========================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionBounds {
    pub partition: i32,
    pub beginning_offset: i64,
    pub end_offset: i64,
}

impl PartitionBounds {
    pub fn new(partition: i32, beginning_offset: i64, end_offset: i64) -> Self {
        Self { partition, beginning_offset, end_offset }
    }

    pub fn validate(&self) -> Result<()> {
        if self.beginning_offset > self.end_offset {
            return Err(InspectorError::InvalidBounds {
                partition: self.partition,
                beginning: self.beginning_offset,
                end: self.end_offset,
            });
        }
        Ok(())
    }

    pub fn contains(&self, offset: i64) -> bool {
        self.beginning_offset <= offset && offset <= self.end_offset
    }

    pub fn len(&self) -> i64 {
        self.end_offset - self.beginning_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }
}

// ==========================================
// FILTERS & QUERIES
// ==========================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    pub key_filter: Option<String>,
    pub value_filter: Option<String>,
    #[serde(alias = "jsonKey")]
    pub json_key_filter: Option<String>,
    #[serde(alias = "jsonValue")]
    pub json_value_filter: Option<String>,
}

impl MessageFilter {
    /// Empty strings count as absent.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.is_empty())
        }
        Self {
            key_filter: clean(self.key_filter),
            value_filter: clean(self.value_filter),
            json_key_filter: clean(self.json_key_filter),
            json_value_filter: clean(self.json_value_filter),
        }
    }

    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);
        blank(&self.key_filter)
            && blank(&self.value_filter)
            && blank(&self.json_key_filter)
            && blank(&self.json_value_filter)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchQuery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub count: usize,
    pub filter: MessageFilter,
}

impl FetchQuery {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, count: usize) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            count,
            filter: MessageFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter.normalized();
        self
    }
}
