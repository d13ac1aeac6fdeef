use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::dashboard::response::{ApiResponse, ApiResult};
use crate::inspector::group::{
    sort_rows, GroupLagSummary, GroupOffsetRow, OffsetColumn, SeekCommand, SeekMode, SeekOutcome, SortOrder,
};
use crate::TopicLensEngine;

#[derive(Deserialize)]
pub struct OffsetTableParams {
    pub sort: Option<OffsetColumn>,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Serialize)]
pub struct OffsetRowView {
    #[serde(flatten)]
    pub row: GroupOffsetRow,
    pub lag: Option<i64>,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub seek: SeekMode,
    /// Absent means every partition of the topic.
    pub partition: Option<i32>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CommitRequest {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedGroup {
    pub group_id: String,
    pub topics: usize,
}

pub async fn list_groups(
    State(engine): State<TopicLensEngine>,
    Path(topic): Path<String>,
) -> ApiResult<Vec<GroupLagSummary>> {
    engine.cluster.topic(&topic)?;
    let groups = engine.cluster.groups_for_topic(&topic);
    Ok(ApiResponse::ok(engine.groups.group_lags(&topic, groups).await?))
}

pub async fn delete_group(State(engine): State<TopicLensEngine>, Path(group): Path<String>) -> ApiResult<DeletedGroup> {
    let topics = engine.cluster.delete_group(&group)?;
    Ok(ApiResponse::ok(DeletedGroup { group_id: group, topics }))
}

pub async fn list_offsets(
    State(engine): State<TopicLensEngine>,
    Path((topic, group)): Path<(String, String)>,
    Query(params): Query<OffsetTableParams>,
) -> ApiResult<Vec<OffsetRowView>> {
    let mut rows = engine.groups.list_offsets(&topic, &group).await?;
    if let Some(column) = params.sort {
        sort_rows(&mut rows, column, params.order);
    }

    let view = rows
        .into_iter()
        .map(|row| OffsetRowView { lag: row.lag(), row })
        .collect();
    Ok(ApiResponse::ok(view))
}

pub async fn reset_offsets(
    State(engine): State<TopicLensEngine>,
    Path((topic, group)): Path<(String, String)>,
    Json(req): Json<ResetRequest>,
) -> ApiResult<Vec<SeekOutcome>> {
    let outcomes = match req.partition {
        Some(partition) => {
            let cmd = SeekCommand { partition, mode: req.seek, custom_offset: req.offset };
            vec![engine.groups.reset(&topic, &group, cmd).await?]
        }
        None => engine.groups.reset_all(&topic, &group, req.seek, req.offset).await?,
    };
    Ok(ApiResponse::ok(outcomes))
}

pub async fn commit_offset(
    State(engine): State<TopicLensEngine>,
    Path((topic, group)): Path<(String, String)>,
    Json(req): Json<CommitRequest>,
) -> ApiResult<SeekOutcome> {
    engine.cluster.commit(&topic, &group, req.partition, req.offset)?;
    Ok(ApiResponse::ok(SeekOutcome { partition: req.partition, target_offset: req.offset }))
}
