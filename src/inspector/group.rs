//! Consumer group offsets: per-partition lag and seek/reset commands.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inspector::error::{FetchReason, InspectorError, Result};
use crate::inspector::message::PartitionBounds;
use crate::inspector::source::{GroupOffsetStore, TopicMetadataSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOffsetRow {
    pub partition: i32,
    pub beginning_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub consumer_offset: Option<i64>,
}

impl GroupOffsetRow {
    /// Unknown unless both the end and the committed offset are known.
    pub fn lag(&self) -> Option<i64> {
        match (self.end_offset, self.consumer_offset) {
            (Some(end), Some(consumer)) => Some(end - consumer),
            _ => None,
        }
    }

    pub fn column(&self, column: OffsetColumn) -> Option<i64> {
        match column {
            OffsetColumn::Partition => Some(self.partition as i64),
            OffsetColumn::BeginningOffset => self.beginning_offset,
            OffsetColumn::EndOffset => self.end_offset,
            OffsetColumn::ConsumerOffset => self.consumer_offset,
            OffsetColumn::Lag => self.lag(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OffsetColumn {
    Partition,
    BeginningOffset,
    EndOffset,
    ConsumerOffset,
    Lag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Stable sort; unknown values order lowest.
pub fn sort_rows(rows: &mut [GroupOffsetRow], column: OffsetColumn, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord = a.column(column).cmp(&b.column(column));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekMode {
    Earliest,
    Latest,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekCommand {
    pub partition: i32,
    pub mode: SeekMode,
    /// Required iff `mode == Custom`.
    pub custom_offset: Option<i64>,
}

impl SeekCommand {
    pub fn earliest(partition: i32) -> Self {
        Self { partition, mode: SeekMode::Earliest, custom_offset: None }
    }

    pub fn latest(partition: i32) -> Self {
        Self { partition, mode: SeekMode::Latest, custom_offset: None }
    }

    pub fn custom(partition: i32, offset: i64) -> Self {
        Self { partition, mode: SeekMode::Custom, custom_offset: Some(offset) }
    }

    /// Target offset against freshly read bounds.
    pub fn target(&self, bounds: &PartitionBounds) -> Result<i64> {
        bounds.validate()?;
        match self.mode {
            SeekMode::Earliest => Ok(bounds.beginning_offset),
            SeekMode::Latest => Ok(bounds.end_offset),
            SeekMode::Custom => {
                let offset = self.custom_offset.ok_or_else(|| {
                    InspectorError::InvalidCommand("custom seek requires an offset".into())
                })?;
                if !bounds.contains(offset) {
                    return Err(InspectorError::OutOfRange {
                        offset,
                        beginning: bounds.beginning_offset,
                        end: bounds.end_offset,
                    });
                }
                Ok(offset)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekOutcome {
    pub partition: i32,
    pub target_offset: i64,
}

#[derive(Clone)]
pub struct ConsumerGroupOffsetTracker {
    store: Arc<dyn GroupOffsetStore>,
    metadata: Arc<dyn TopicMetadataSource>,
}

impl ConsumerGroupOffsetTracker {
    pub fn new(store: Arc<dyn GroupOffsetStore>, metadata: Arc<dyn TopicMetadataSource>) -> Self {
        Self { store, metadata }
    }

    /// Rows in ascending partition order.
    pub async fn list_offsets(&self, topic: &str, group_id: &str) -> Result<Vec<GroupOffsetRow>> {
        let mut rows = self.store.list_offsets(topic, group_id).await?;
        rows.sort_by_key(|r| r.partition);
        Ok(rows)
    }

    /// Validates against current bounds and commits. On error nothing is
    /// committed. Callers re-list to observe the result.
    pub async fn reset(&self, topic: &str, group_id: &str, cmd: SeekCommand) -> Result<SeekOutcome> {
        let partitions = self.metadata.describe_topic(topic).await?;
        let bounds = partitions
            .iter()
            .find(|b| b.partition == cmd.partition)
            .ok_or_else(|| InspectorError::fetch(FetchReason::PartitionNotFound(cmd.partition)))?;

        let target = cmd.target(bounds)?;
        self.store.commit_seek(topic, group_id, cmd.partition, target).await?;

        info!(topic, group = group_id, partition = cmd.partition, target, mode = ?cmd.mode, "[Groups] Offset reset");
        Ok(SeekOutcome { partition: cmd.partition, target_offset: target })
    }

    /// Same mode on every partition. All targets are validated before the
    /// first commit. If a commit fails, partitions already committed are put
    /// back to the offsets listed beforehand and the commit error is
    /// returned; partitions that cannot be put back surface as
    /// `PartialReset`.
    pub async fn reset_all(
        &self,
        topic: &str,
        group_id: &str,
        mode: SeekMode,
        custom_offset: Option<i64>,
    ) -> Result<Vec<SeekOutcome>> {
        let mut partitions = self.metadata.describe_topic(topic).await?;
        partitions.sort_by_key(|b| b.partition);

        let plan = partitions
            .iter()
            .map(|bounds| {
                let cmd = SeekCommand { partition: bounds.partition, mode, custom_offset };
                cmd.target(bounds).map(|target_offset| SeekOutcome { partition: bounds.partition, target_offset })
            })
            .collect::<Result<Vec<_>>>()?;

        let previous = self.store.list_offsets(topic, group_id).await?;

        let mut committed = Vec::with_capacity(plan.len());
        for outcome in &plan {
            if let Err(err) = self
                .store
                .commit_seek(topic, group_id, outcome.partition, outcome.target_offset)
                .await
            {
                warn!(topic, group = group_id, partition = outcome.partition, error = %err, "[Groups] Reset failed, rolling back");
                return Err(self.roll_back(topic, group_id, &committed, &previous, err).await);
            }
            committed.push(outcome.partition);
        }

        info!(topic, group = group_id, partitions = plan.len(), mode = ?mode, "[Groups] Offsets reset on all partitions");
        Ok(plan)
    }

    async fn roll_back(
        &self,
        topic: &str,
        group_id: &str,
        committed: &[i32],
        previous: &[GroupOffsetRow],
        cause: InspectorError,
    ) -> InspectorError {
        let mut stuck = Vec::new();
        for &partition in committed {
            let prior = previous.iter().find(|r| r.partition == partition).and_then(|r| r.consumer_offset);
            if let Err(err) = self.store.restore_offset(topic, group_id, partition, prior).await {
                warn!(topic, group = group_id, partition, error = %err, "[Groups] Could not restore offset");
                stuck.push(partition);
            }
        }

        if stuck.is_empty() {
            cause
        } else {
            InspectorError::PartialReset { committed: stuck, reason: cause.to_string() }
        }
    }

    /// Total lag per group on `topic`, sorted by group id.
    pub async fn group_lags(&self, topic: &str, groups: Vec<String>) -> Result<Vec<GroupLagSummary>> {
        let mut out = Vec::with_capacity(groups.len());
        for group_id in groups {
            let rows = self.store.list_offsets(topic, &group_id).await?;
            out.push(GroupLagSummary { lag: total_lag(&rows), group_id });
        }
        out.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLagSummary {
    pub group_id: String,
    pub lag: i64,
}

/// Sum over partitions with a known lag; unknown lags are skipped.
pub fn total_lag(rows: &[GroupOffsetRow]) -> i64 {
    rows.iter().filter_map(GroupOffsetRow::lag).sum()
}
