use std::sync::Arc;

use async_trait::async_trait;
use topiclens::cluster::InMemoryCluster;
use topiclens::inspector::error::{FetchReason, InspectorError, Result};
use topiclens::inspector::group::{
    sort_rows, ConsumerGroupOffsetTracker, GroupLagSummary, GroupOffsetRow, OffsetColumn, SeekCommand, SeekMode,
    SeekOutcome, SortOrder,
};
use topiclens::inspector::source::GroupOffsetStore;
mod helpers;
use helpers::seeded_cluster;

fn tracker(cluster: &Arc<InMemoryCluster>) -> ConsumerGroupOffsetTracker {
    ConsumerGroupOffsetTracker::new(cluster.clone(), cluster.clone())
}

/// Partition 0 retains [100, 500), partition 1 [0, 20), partition 2 [0, 0).
fn orders_cluster() -> Arc<InMemoryCluster> {
    let cluster = seeded_cluster("orders", &[500, 20, 0]);
    cluster.truncate_before("orders", 0, 100).unwrap();
    cluster
}

/// Cluster-backed store whose commits fail on one partition.
struct FlakyStore {
    inner: Arc<InMemoryCluster>,
    fail_on: i32,
    restore_fails: bool,
}

#[async_trait]
impl GroupOffsetStore for FlakyStore {
    async fn list_offsets(&self, topic: &str, group_id: &str) -> Result<Vec<GroupOffsetRow>> {
        self.inner.list_offsets(topic, group_id).await
    }

    async fn commit_seek(&self, topic: &str, group_id: &str, partition: i32, target_offset: i64) -> Result<()> {
        if partition == self.fail_on {
            return Err(InspectorError::fetch(FetchReason::Transport("broker gone".into())));
        }
        self.inner.commit_seek(topic, group_id, partition, target_offset).await
    }

    async fn restore_offset(&self, topic: &str, group_id: &str, partition: i32, previous: Option<i64>) -> Result<()> {
        if self.restore_fails {
            return Err(InspectorError::fetch(FetchReason::Transport("broker gone".into())));
        }
        self.inner.restore_offset(topic, group_id, partition, previous).await
    }
}

fn flaky_tracker(cluster: &Arc<InMemoryCluster>, fail_on: i32, restore_fails: bool) -> ConsumerGroupOffsetTracker {
    let store = Arc::new(FlakyStore { inner: cluster.clone(), fail_on, restore_fails });
    ConsumerGroupOffsetTracker::new(store, cluster.clone())
}

mod features {
    use super::*;

    #[tokio::test]
    async fn test_rows_ascending_with_unknown_lag() {
        let cluster = orders_cluster();
        cluster.commit("orders", "billing", 1, 15).unwrap();

        let rows = tracker(&cluster).list_offsets("orders", "billing").await.unwrap();
        assert_eq!(rows.iter().map(|r| r.partition).collect::<Vec<_>>(), vec![0, 1, 2]);

        assert_eq!(rows[0].beginning_offset, Some(100));
        assert_eq!(rows[0].end_offset, Some(500));
        assert_eq!(rows[0].consumer_offset, None);
        assert_eq!(rows[0].lag(), None);
        assert_eq!(rows[1].lag(), Some(5));
    }

    #[test]
    fn test_lag_unknown_is_not_end_offset() {
        let row = GroupOffsetRow { partition: 0, beginning_offset: Some(10), end_offset: Some(50), consumer_offset: None };
        assert_eq!(row.lag(), None);
    }

    #[tokio::test]
    async fn test_custom_seek_out_of_range_leaves_store_untouched() {
        let cluster = orders_cluster();
        cluster.commit("orders", "billing", 0, 200).unwrap();
        let groups = tracker(&cluster);

        let err = groups.reset("orders", "billing", SeekCommand::custom(0, 600)).await.unwrap_err();
        assert_eq!(err, InspectorError::OutOfRange { offset: 600, beginning: 100, end: 500 });

        let err = groups.reset("orders", "billing", SeekCommand::custom(0, 99)).await.unwrap_err();
        assert!(matches!(err, InspectorError::OutOfRange { offset: 99, .. }));

        let rows = groups.list_offsets("orders", "billing").await.unwrap();
        assert_eq!(rows[0].consumer_offset, Some(200));
    }

    #[tokio::test]
    async fn test_reset_modes_then_relist() {
        let cluster = orders_cluster();
        let groups = tracker(&cluster);

        let done = groups.reset("orders", "billing", SeekCommand::earliest(0)).await.unwrap();
        assert_eq!(done, SeekOutcome { partition: 0, target_offset: 100 });
        assert_eq!(groups.list_offsets("orders", "billing").await.unwrap()[0].lag(), Some(400));

        groups.reset("orders", "billing", SeekCommand::latest(0)).await.unwrap();
        assert_eq!(groups.list_offsets("orders", "billing").await.unwrap()[0].lag(), Some(0));

        groups.reset("orders", "billing", SeekCommand::custom(0, 480)).await.unwrap();
        let row = groups.list_offsets("orders", "billing").await.unwrap()[0];
        assert_eq!(row.consumer_offset, Some(480));
        assert_eq!(row.lag(), Some(20));
    }

    #[tokio::test]
    async fn test_reset_validates_against_current_bounds() {
        let cluster = orders_cluster();
        let groups = tracker(&cluster);

        // Retention moves past the offset between two resets
        groups.reset("orders", "billing", SeekCommand::custom(0, 150)).await.unwrap();
        cluster.truncate_before("orders", 0, 200).unwrap();
        let err = groups.reset("orders", "billing", SeekCommand::custom(0, 150)).await.unwrap_err();
        assert_eq!(err, InspectorError::OutOfRange { offset: 150, beginning: 200, end: 500 });
    }

    #[tokio::test]
    async fn test_reset_unknown_partition_or_topic() {
        let cluster = orders_cluster();
        let groups = tracker(&cluster);

        let err = groups.reset("orders", "billing", SeekCommand::earliest(9)).await.unwrap_err();
        assert_eq!(err, InspectorError::fetch(FetchReason::PartitionNotFound(9)));

        let err = groups.list_offsets("missing", "billing").await.unwrap_err();
        assert_eq!(err, InspectorError::fetch(FetchReason::TopicNotFound("missing".into())));
    }

    #[tokio::test]
    async fn test_reset_all_is_validated_before_commit() {
        let cluster = orders_cluster();
        let groups = tracker(&cluster);

        // 150 fits partition 0 but not partitions 1 and 2
        let err = groups
            .reset_all("orders", "billing", SeekMode::Custom, Some(150))
            .await
            .unwrap_err();
        assert!(matches!(err, InspectorError::OutOfRange { offset: 150, .. }));
        assert!(cluster.groups_for_topic("orders").is_empty());

        let plan = groups.reset_all("orders", "billing", SeekMode::Earliest, None).await.unwrap();
        assert_eq!(
            plan,
            vec![
                SeekOutcome { partition: 0, target_offset: 100 },
                SeekOutcome { partition: 1, target_offset: 0 },
                SeekOutcome { partition: 2, target_offset: 0 },
            ]
        );
        assert_eq!(cluster.groups_for_topic("orders"), vec!["billing".to_string()]);
    }

    #[tokio::test]
    async fn test_sort_by_lag_keeps_partition_order_on_ties() {
        let cluster = seeded_cluster("events", &[10, 10, 10, 10]);
        cluster.commit("events", "audit", 0, 5).unwrap();
        cluster.commit("events", "audit", 2, 5).unwrap();
        cluster.commit("events", "audit", 3, 10).unwrap();

        let mut rows = tracker(&cluster).list_offsets("events", "audit").await.unwrap();
        sort_rows(&mut rows, OffsetColumn::Lag, SortOrder::Desc);
        assert_eq!(rows.iter().map(|r| r.partition).collect::<Vec<_>>(), vec![0, 2, 3, 1]);

        sort_rows(&mut rows, OffsetColumn::Partition, SortOrder::Asc);
        sort_rows(&mut rows, OffsetColumn::Lag, SortOrder::Asc);
        assert_eq!(rows.iter().map(|r| r.partition).collect::<Vec<_>>(), vec![1, 3, 0, 2]);
    }

    #[tokio::test]
    async fn test_reset_all_rolls_back_when_a_commit_fails() {
        let cluster = seeded_cluster("orders", &[10, 10, 10]);
        let groups = flaky_tracker(&cluster, 1, false);

        let err = groups.reset_all("orders", "billing", SeekMode::Latest, None).await.unwrap_err();
        assert_eq!(err, InspectorError::fetch(FetchReason::Transport("broker gone".into())));

        // Partition 0 was committed at 10 before partition 1 failed; it is gone again
        let rows = tracker(&cluster).list_offsets("orders", "billing").await.unwrap();
        assert!(rows.iter().all(|r| r.consumer_offset.is_none()));
        assert!(cluster.groups_for_topic("orders").is_empty());
    }

    #[tokio::test]
    async fn test_reset_all_restores_previous_commits() {
        let cluster = seeded_cluster("orders", &[10, 10, 10]);
        cluster.commit("orders", "billing", 0, 4).unwrap();
        cluster.commit("orders", "billing", 1, 6).unwrap();
        let groups = flaky_tracker(&cluster, 2, false);

        let err = groups.reset_all("orders", "billing", SeekMode::Earliest, None).await.unwrap_err();
        assert_eq!(err.code(), "TRANSPORT");

        let rows = tracker(&cluster).list_offsets("orders", "billing").await.unwrap();
        let committed: Vec<Option<i64>> = rows.iter().map(|r| r.consumer_offset).collect();
        assert_eq!(committed, vec![Some(4), Some(6), None]);
    }

    #[tokio::test]
    async fn test_reset_all_names_partitions_it_could_not_restore() {
        let cluster = seeded_cluster("orders", &[10, 10, 10]);
        let groups = flaky_tracker(&cluster, 2, true);

        let err = groups.reset_all("orders", "billing", SeekMode::Latest, None).await.unwrap_err();
        match err {
            InspectorError::PartialReset { committed, reason } => {
                assert_eq!(committed, vec![0, 1]);
                assert!(reason.contains("broker gone"));
            }
            other => panic!("expected PartialReset, got {:?}", other),
        }
        assert_eq!(tracker(&cluster).list_offsets("orders", "billing").await.unwrap()[0].consumer_offset, Some(10));
    }

    #[tokio::test]
    async fn test_group_lags_sum_known_partitions_only() {
        let cluster = orders_cluster();
        // billing: p0 lag 100, p1 lag 5, p2 unknown
        cluster.commit("orders", "billing", 0, 400).unwrap();
        cluster.commit("orders", "billing", 1, 15).unwrap();
        cluster.commit("orders", "audit", 2, 0).unwrap();

        let groups = cluster.groups_for_topic("orders");
        let lags = tracker(&cluster).group_lags("orders", groups).await.unwrap();
        assert_eq!(
            lags,
            vec![
                GroupLagSummary { group_id: "audit".into(), lag: 0 },
                GroupLagSummary { group_id: "billing".into(), lag: 105 },
            ]
        );
    }
}
