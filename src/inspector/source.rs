//! Collaborator contracts: the boundary between the inspector core and
//! whatever actually talks to the log store.
//!
//! Filtering contract: `fetch_batch` and `open_live_subscription` receive the
//! caller's filters and are expected to apply them at the source. The core
//! never re-applies them to what a source returns.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::inspector::error::{InspectorError, Result};
use crate::inspector::group::GroupOffsetRow;
use crate::inspector::message::{Message, MessageFilter, PartitionBounds};

/// One push from a live subscription.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBatch {
    pub partition: i32,
    pub beginning_offset: i64,
    pub end_offset: i64,
    pub messages: Vec<Message>,
}

impl LiveBatch {
    pub fn bounds(&self) -> PartitionBounds {
        PartitionBounds::new(self.partition, self.beginning_offset, self.end_offset)
    }
}

#[derive(Debug)]
pub enum LiveEvent {
    Batch(LiveBatch),
    Error(String),
    Closed,
}

/// Release side of a subscription. `close` must be idempotent.
pub trait SubscriptionHandle: Send + Sync {
    fn close(&self);
}

pub struct LiveSubscription {
    pub handle: Box<dyn SubscriptionHandle>,
    pub events: mpsc::Receiver<LiveEvent>,
}

#[async_trait]
pub trait TopicDataSource: Send + Sync {
    /// Up to `count` messages from `offset`, filtered at the source.
    async fn fetch_batch(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        count: usize,
        filter: &MessageFilter,
    ) -> Result<Vec<Message>>;

    /// Push subscription starting at the partition's current end ("now").
    async fn open_live_subscription(
        &self,
        topic: &str,
        partition: i32,
        filter: &MessageFilter,
    ) -> Result<LiveSubscription>;
}

#[async_trait]
pub trait TopicMetadataSource: Send + Sync {
    async fn describe_topic(&self, topic: &str) -> Result<Vec<PartitionBounds>>;
}

#[async_trait]
pub trait GroupOffsetStore: Send + Sync {
    async fn list_offsets(&self, topic: &str, group_id: &str) -> Result<Vec<GroupOffsetRow>>;

    async fn commit_seek(&self, topic: &str, group_id: &str, partition: i32, target_offset: i64) -> Result<()>;

    /// Puts a partition back to a previously listed consumer offset; `None`
    /// means the group had no commit there. Stores that cannot drop a commit
    /// only restore known offsets.
    async fn restore_offset(&self, topic: &str, group_id: &str, partition: i32, previous: Option<i64>) -> Result<()> {
        match previous {
            Some(offset) => self.commit_seek(topic, group_id, partition, offset).await,
            None => Err(InspectorError::InvalidCommand(format!(
                "store cannot remove the commit on partition {}",
                partition
            ))),
        }
    }
}
