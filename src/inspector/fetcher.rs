//! Historical Fetcher: one bounded pull per call.
//!
//! resolve offset -> ask the source for a batch -> decode JSON views.
//! Filters ride along to the source; results are not filtered again here.

use std::sync::Arc;

use tracing::debug;

use crate::inspector::error::{FetchReason, InspectorError, Result};
use crate::inspector::message::{FetchQuery, Message, MessageFilter, PartitionBounds};
use crate::inspector::offset::{resolve, OffsetPolicy};
use crate::inspector::source::{TopicDataSource, TopicMetadataSource};

/// Where a pull starts: an explicit offset or a policy resolved against
/// the partition's current bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    Offset(i64),
    Policy(OffsetPolicy),
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub topic: String,
    pub partition: i32,
    pub start: StartAt,
    pub count: usize,
    pub filter: MessageFilter,
}

#[derive(Debug, Clone)]
pub struct PullResult {
    pub offset: i64,
    pub bounds: PartitionBounds,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct HistoricalFetcher {
    source: Arc<dyn TopicDataSource>,
    metadata: Arc<dyn TopicMetadataSource>,
}

impl HistoricalFetcher {
    pub fn new(source: Arc<dyn TopicDataSource>, metadata: Arc<dyn TopicMetadataSource>) -> Self {
        Self { source, metadata }
    }

    pub async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Message>> {
        fetch(self.source.as_ref(), query).await
    }

    /// Builds the query from current metadata, then fetches.
    pub async fn pull(&self, request: PullRequest) -> Result<PullResult> {
        let bounds = self.partition_bounds(&request.topic, request.partition).await?;
        let offset = match request.start {
            StartAt::Offset(offset) => offset,
            StartAt::Policy(policy) => resolve(&bounds, &policy)?,
        };

        let query = FetchQuery::new(request.topic, request.partition, offset, request.count)
            .with_filter(request.filter);
        let messages = self.fetch(&query).await?;

        Ok(PullResult { offset, bounds, messages })
    }

    pub async fn partition_bounds(&self, topic: &str, partition: i32) -> Result<PartitionBounds> {
        let partitions = self.metadata.describe_topic(topic).await?;
        let bounds = partitions
            .into_iter()
            .find(|b| b.partition == partition)
            .ok_or_else(|| InspectorError::fetch(FetchReason::PartitionNotFound(partition)))?;
        bounds.validate()?;
        Ok(bounds)
    }
}

pub async fn fetch(source: &dyn TopicDataSource, query: &FetchQuery) -> Result<Vec<Message>> {
    if query.count == 0 {
        return Err(InspectorError::InvalidCommand("count must be greater than zero".into()));
    }

    let raw = source
        .fetch_batch(&query.topic, query.partition, query.offset, query.count, &query.filter)
        .await?;

    debug!(
        topic = %query.topic,
        partition = query.partition,
        offset = query.offset,
        returned = raw.len(),
        "historical batch fetched"
    );

    Ok(raw.into_iter().map(Message::decoded).collect())
}
