#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use topiclens::cluster::{InMemoryCluster, ProduceRecord};
use topiclens::config::ClusterConfig;
use topiclens::inspector::error::{InspectorError, Result};
use topiclens::inspector::message::{Message, MessageFilter, PartitionBounds};
use topiclens::inspector::source::{
    LiveBatch, LiveEvent, LiveSubscription, SubscriptionHandle, TopicDataSource, TopicMetadataSource,
};

// ========================================
// SCRIPTED SOURCE
// ========================================

#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub count: usize,
    pub filter: MessageFilter,
}

pub struct ScriptedHandle {
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle for ScriptedHandle {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct OpenedSubscription {
    sender: mpsc::Sender<LiveEvent>,
    closed: Arc<AtomicBool>,
    filter: MessageFilter,
}

/// Fake collaborator: returns canned messages verbatim and lets the test push
/// live events by hand.
#[derive(Default)]
pub struct ScriptedSource {
    messages: Mutex<Vec<Message>>,
    bounds: Mutex<Vec<PartitionBounds>>,
    fetch_error: Mutex<Option<InspectorError>>,
    open_error: Mutex<Option<InspectorError>>,
    calls: Mutex<Vec<FetchCall>>,
    subscriptions: Mutex<Vec<OpenedSubscription>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_messages(self: Arc<Self>, messages: Vec<Message>) -> Arc<Self> {
        *self.messages.lock() = messages;
        self
    }

    pub fn with_bounds(self: Arc<Self>, bounds: Vec<PartitionBounds>) -> Arc<Self> {
        *self.bounds.lock() = bounds;
        self
    }

    pub fn fail_fetch(&self, err: InspectorError) {
        *self.fetch_error.lock() = Some(err);
    }

    pub fn fail_open(&self, err: InspectorError) {
        *self.open_error.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    pub fn subscriptions_opened(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_closed(&self, idx: usize) -> bool {
        self.subscriptions.lock()[idx].closed.load(Ordering::SeqCst)
    }

    pub fn subscription_filter(&self, idx: usize) -> MessageFilter {
        self.subscriptions.lock()[idx].filter.clone()
    }

    /// Delivers an event on subscription `idx`. False if the receiver is gone.
    pub async fn push(&self, idx: usize, event: LiveEvent) -> bool {
        let sender = self.subscriptions.lock()[idx].sender.clone();
        sender.send(event).await.is_ok()
    }

    /// Drops the sender side, as a transport would on clean shutdown.
    pub fn hang_up(&self, idx: usize) {
        let (dead, _) = mpsc::channel(1);
        self.subscriptions.lock()[idx].sender = dead;
    }
}

#[async_trait]
impl TopicDataSource for ScriptedSource {
    async fn fetch_batch(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        count: usize,
        filter: &MessageFilter,
    ) -> Result<Vec<Message>> {
        self.calls.lock().push(FetchCall {
            topic: topic.to_string(),
            partition,
            offset,
            count,
            filter: filter.clone(),
        });
        if let Some(err) = self.fetch_error.lock().clone() {
            return Err(err);
        }
        Ok(self.messages.lock().iter().take(count).cloned().collect())
    }

    async fn open_live_subscription(
        &self,
        _topic: &str,
        _partition: i32,
        filter: &MessageFilter,
    ) -> Result<LiveSubscription> {
        if let Some(err) = self.open_error.lock().clone() {
            return Err(err);
        }
        let (sender, events) = mpsc::channel(64);
        let closed = Arc::new(AtomicBool::new(false));
        self.subscriptions.lock().push(OpenedSubscription {
            sender,
            closed: closed.clone(),
            filter: filter.clone(),
        });
        Ok(LiveSubscription {
            handle: Box::new(ScriptedHandle { closed }),
            events,
        })
    }
}

#[async_trait]
impl TopicMetadataSource for ScriptedSource {
    async fn describe_topic(&self, _topic: &str) -> Result<Vec<PartitionBounds>> {
        Ok(self.bounds.lock().clone())
    }
}

// ========================================
// FIXTURES
// ========================================

pub fn numbered(partition: i32, offsets: std::ops::RangeInclusive<i64>) -> Vec<Message> {
    offsets
        .map(|o| Message::new(partition, o, Some(format!("k{}", o)), format!("{{\"seq\":{}}}", o), 1_700_000_000_000 + o))
        .collect()
}

pub fn batch(partition: i32, offsets: std::ops::RangeInclusive<i64>) -> LiveEvent {
    let end = *offsets.end() + 1;
    LiveEvent::Batch(LiveBatch {
        partition,
        beginning_offset: 0,
        end_offset: end,
        messages: numbered(partition, offsets),
    })
}

pub fn test_cluster_config() -> ClusterConfig {
    ClusterConfig {
        live_poll_interval_ms: 20,
        ..ClusterConfig::default()
    }
}

/// Cluster with one topic; partition `p` holds `per_partition[p]` JSON records.
pub fn seeded_cluster(topic: &str, per_partition: &[usize]) -> Arc<InMemoryCluster> {
    let cluster = Arc::new(InMemoryCluster::new(test_cluster_config()));
    cluster.create_topic(topic, Some(per_partition.len() as u32)).unwrap();
    for (partition, &n) in per_partition.iter().enumerate() {
        for i in 0..n {
            let record = ProduceRecord::keyed(format!("user-{}", i % 5), format!("{{\"id\":{},\"status\":\"s{}\"}}", i, i % 3))
                .to_partition(partition as i32);
            cluster.produce(topic, record).unwrap();
        }
    }
    cluster
}

pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
