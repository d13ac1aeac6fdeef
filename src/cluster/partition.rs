use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Notify;

use crate::inspector::message::{Message, PartitionBounds};
use crate::utils::{now_ms, payload_to_text};

#[derive(Clone, Debug)]
pub struct Record {
    pub offset: i64,
    pub timestamp: i64,
    pub key: Option<Bytes>,
    pub payload: Bytes,
    pub headers: BTreeMap<String, String>,
}

impl Record {
    pub fn to_message(&self, partition: i32) -> Message {
        Message {
            partition,
            offset: self.offset,
            key: self.key.as_deref().map(payload_to_text),
            value: payload_to_text(&self.payload),
            timestamp: self.timestamp,
            headers: self.headers.clone(),
            decoded_view: None,
        }
    }
}

pub struct Partition {
    pub id: i32,
    pub records: VecDeque<Record>,
    pub start_offset: i64,
    pub next_offset: i64,
    pub new_data_notifier: Arc<Notify>,
}

impl Partition {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            records: VecDeque::new(),
            start_offset: 0,
            next_offset: 0,
            new_data_notifier: Arc::new(Notify::new()),
        }
    }

    pub fn append(&mut self, key: Option<Bytes>, payload: Bytes, headers: BTreeMap<String, String>) -> i64 {
        let offset = self.next_offset;
        self.records.push_back(Record {
            offset,
            timestamp: now_ms(),
            key,
            payload,
            headers,
        });
        self.next_offset += 1;

        // Wake live subscriptions parked on this partition
        self.new_data_notifier.notify_waiters();

        offset
    }

    /// Records from `offset` onwards, at most `limit`. Offsets before the
    /// retained start read from the start.
    pub fn read(&self, offset: i64, limit: usize) -> Vec<Record> {
        let offset = offset.max(self.start_offset);
        let relative_idx = (offset - self.start_offset) as usize;
        if relative_idx >= self.records.len() {
            return Vec::new();
        }
        self.records.range(relative_idx..).take(limit).cloned().collect()
    }

    /// Retention: drop everything before `offset` (clamped to the end).
    pub fn truncate_before(&mut self, offset: i64) -> usize {
        let target = offset.min(self.next_offset);
        let mut dropped = 0;
        while self.start_offset < target {
            self.records.pop_front();
            self.start_offset += 1;
            dropped += 1;
        }
        dropped
    }

    pub fn bounds(&self) -> PartitionBounds {
        PartitionBounds::new(self.id, self.start_offset, self.next_offset)
    }

    pub fn high_watermark(&self) -> i64 {
        self.next_offset
    }
}
