//! In-memory log store.
//!
//! Topics of offset-addressed partitions plus committed group offsets. It
//! implements every collaborator contract the inspector consumes, applying
//! fetch and live filters at the source.

pub mod partition;
pub mod subscription;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::partition::Partition;
use crate::cluster::subscription::{open_subscription, PumpSettings};
use crate::config::ClusterConfig;
use crate::inspector::error::{FetchReason, InspectorError, Result};
use crate::inspector::filter::matches;
use crate::inspector::group::GroupOffsetRow;
use crate::inspector::message::{Message, MessageFilter, PartitionBounds};
use crate::inspector::source::{GroupOffsetStore, LiveSubscription, TopicDataSource, TopicMetadataSource};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRecord {
    pub partition: Option<i32>,
    pub key: Option<String>,
    pub value: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProduceRecord {
    pub fn value(value: impl Into<String>) -> Self {
        Self { value: value.into(), ..Default::default() }
    }

    pub fn keyed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: Some(key.into()), value: value.into(), ..Default::default() }
    }

    pub fn to_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceAck {
    pub partition: i32,
    pub offset: i64,
}

pub struct TopicLog {
    pub name: String,
    pub partitions: Vec<Arc<RwLock<Partition>>>,
    round_robin: AtomicUsize,
}

impl TopicLog {
    fn new(name: String, partitions: u32) -> Self {
        Self {
            name,
            partitions: (0..partitions as i32).map(|id| Arc::new(RwLock::new(Partition::new(id)))).collect(),
            round_robin: AtomicUsize::new(0),
        }
    }

    pub fn partition(&self, id: i32) -> Result<&Arc<RwLock<Partition>>> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.partitions.get(idx))
            .ok_or_else(|| InspectorError::fetch(FetchReason::PartitionNotFound(id)))
    }

    pub fn bounds(&self) -> Vec<PartitionBounds> {
        self.partitions.iter().map(|p| p.read().bounds()).collect()
    }

    fn pick_partition(&self, record: &ProduceRecord) -> Result<i32> {
        let count = self.partitions.len();
        match (record.partition, &record.key) {
            (Some(id), _) => self.partition(id).map(|_| id),
            (None, Some(key)) => Ok((crc32fast::hash(key.as_bytes()) as usize % count) as i32),
            (None, None) => Ok((self.round_robin.fetch_add(1, Ordering::Relaxed) % count) as i32),
        }
    }
}

pub struct InMemoryCluster {
    topics: DashMap<String, Arc<TopicLog>>,
    // (topic, group) -> partition -> committed offset
    group_offsets: DashMap<(String, String), BTreeMap<i32, i64>>,
    config: ClusterConfig,
}

impl InMemoryCluster {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            topics: DashMap::new(),
            group_offsets: DashMap::new(),
            config,
        }
    }

    pub fn create_topic(&self, name: &str, partitions: Option<u32>) -> Result<()> {
        let partitions = partitions.unwrap_or(self.config.default_partitions);
        if partitions == 0 || partitions > self.config.max_partitions {
            return Err(InspectorError::InvalidCommand(format!(
                "partition count must be between 1 and {} (got {})",
                self.config.max_partitions, partitions
            )));
        }

        match self.topics.entry(name.to_string()) {
            Entry::Occupied(_) => Err(InspectorError::InvalidCommand(format!("topic '{}' already exists", name))),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TopicLog::new(name.to_string(), partitions)));
                info!("[Cluster] Created topic '{}' with {} partitions", name, partitions);
                Ok(())
            }
        }
    }

    pub fn topic(&self, name: &str) -> Result<Arc<TopicLog>> {
        self.topics
            .get(name)
            .map(|t| t.clone())
            .ok_or_else(|| InspectorError::fetch(FetchReason::TopicNotFound(name.to_string())))
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    pub fn produce(&self, topic: &str, record: ProduceRecord) -> Result<ProduceAck> {
        let log = self.topic(topic)?;
        let partition = log.pick_partition(&record)?;
        let offset = log.partition(partition)?.write().append(
            record.key.map(Bytes::from),
            Bytes::from(record.value),
            record.headers,
        );
        debug!(topic, partition, offset, "[Cluster] Produced");
        Ok(ProduceAck { partition, offset })
    }

    /// Retention: advances the beginning offset of one partition.
    pub fn truncate_before(&self, topic: &str, partition: i32, offset: i64) -> Result<usize> {
        let log = self.topic(topic)?;
        let dropped = log.partition(partition)?.write().truncate_before(offset);
        info!(topic, partition, dropped, "[Cluster] Truncated partition");
        Ok(dropped)
    }

    /// Regular consumer commit.
    pub fn commit(&self, topic: &str, group_id: &str, partition: i32, offset: i64) -> Result<()> {
        self.topic(topic)?.partition(partition)?;
        self.group_offsets
            .entry((topic.to_string(), group_id.to_string()))
            .or_default()
            .insert(partition, offset);
        Ok(())
    }

    /// Groups with at least one committed offset on `topic`.
    pub fn groups_for_topic(&self, topic: &str) -> Vec<String> {
        let mut groups: Vec<String> = self
            .group_offsets
            .iter()
            .filter(|entry| entry.key().0 == topic && !entry.value().is_empty())
            .map(|entry| entry.key().1.clone())
            .collect();
        groups.sort();
        groups
    }

    /// Drops every committed offset of `group_id` across all topics.
    /// Returns the number of topics the group had commits on.
    pub fn delete_group(&self, group_id: &str) -> Result<usize> {
        let keys: Vec<(String, String)> = self
            .group_offsets
            .iter()
            .filter(|entry| entry.key().1 == group_id)
            .map(|entry| entry.key().clone())
            .collect();
        if keys.is_empty() {
            return Err(InspectorError::fetch(FetchReason::GroupNotFound(group_id.to_string())));
        }

        for key in &keys {
            self.group_offsets.remove(key);
        }
        info!(group = group_id, topics = keys.len(), "[Cluster] Deleted consumer group");
        Ok(keys.len())
    }

    fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            batch_limit: self.config.live_batch_limit.max(1),
            poll_interval: Duration::from_millis(self.config.live_poll_interval_ms.max(1)),
            channel_capacity: self.config.live_channel_capacity,
        }
    }

    fn scan_budget(&self, count: usize) -> usize {
        count.saturating_mul(self.config.scan_multiplier).max(self.config.max_scan_floor)
    }
}

#[async_trait]
impl TopicDataSource for InMemoryCluster {
    async fn fetch_batch(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        count: usize,
        filter: &MessageFilter,
    ) -> Result<Vec<Message>> {
        let log = self.topic(topic)?;
        let part = log.partition(partition)?.read();
        let bounds = part.bounds();
        if !bounds.contains(offset) {
            return Err(InspectorError::fetch(FetchReason::OffsetOutOfRange {
                offset,
                beginning: bounds.beginning_offset,
                end: bounds.end_offset,
            }));
        }

        let budget = self.scan_budget(count);
        let start = (offset - part.start_offset) as usize;
        let mut out = Vec::with_capacity(count.min(part.records.len()));
        for record in part.records.range(start..).take(budget) {
            let msg = record.to_message(partition);
            if matches(&msg, filter) {
                out.push(msg);
                if out.len() >= count {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn open_live_subscription(
        &self,
        topic: &str,
        partition: i32,
        filter: &MessageFilter,
    ) -> Result<LiveSubscription> {
        let log = self.topic(topic)?;
        let part = log.partition(partition)?.clone();
        Ok(open_subscription(topic.to_string(), part, filter.clone(), self.pump_settings()))
    }
}

#[async_trait]
impl TopicMetadataSource for InMemoryCluster {
    async fn describe_topic(&self, topic: &str) -> Result<Vec<PartitionBounds>> {
        Ok(self.topic(topic)?.bounds())
    }
}

#[async_trait]
impl GroupOffsetStore for InMemoryCluster {
    async fn list_offsets(&self, topic: &str, group_id: &str) -> Result<Vec<GroupOffsetRow>> {
        let bounds = self.topic(topic)?.bounds();
        let committed = self
            .group_offsets
            .get(&(topic.to_string(), group_id.to_string()))
            .map(|m| m.clone())
            .unwrap_or_default();

        Ok(bounds
            .into_iter()
            .map(|b| GroupOffsetRow {
                partition: b.partition,
                beginning_offset: Some(b.beginning_offset),
                end_offset: Some(b.end_offset),
                consumer_offset: committed.get(&b.partition).copied(),
            })
            .collect())
    }

    async fn commit_seek(&self, topic: &str, group_id: &str, partition: i32, target_offset: i64) -> Result<()> {
        self.commit(topic, group_id, partition, target_offset)
    }

    async fn restore_offset(&self, topic: &str, group_id: &str, partition: i32, previous: Option<i64>) -> Result<()> {
        match previous {
            Some(offset) => self.commit(topic, group_id, partition, offset),
            None => {
                let key = (topic.to_string(), group_id.to_string());
                if let Some(mut offsets) = self.group_offsets.get_mut(&key) {
                    offsets.remove(&partition);
                }
                self.group_offsets.remove_if(&key, |_, offsets| offsets.is_empty());
                Ok(())
            }
        }
    }
}
