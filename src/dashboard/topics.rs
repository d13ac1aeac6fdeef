use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cluster::{ProduceAck, ProduceRecord};
use crate::dashboard::response::{ApiResponse, ApiResult};
use crate::inspector::fetcher::{PullRequest, StartAt};
use crate::inspector::message::{Message, MessageFilter, PartitionBounds};
use crate::inspector::offset::{OffsetMode, OffsetPolicy};
use crate::utils::millis_to_rfc3339;
use crate::TopicLensEngine;

#[derive(Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
    pub partitions: Option<u32>,
}

#[derive(Serialize)]
pub struct TopicDetail {
    pub name: String,
    pub partitions: Vec<PartitionBounds>,
    pub groups: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub auto_offset_reset: Option<OffsetMode>,
    pub count: Option<usize>,
    pub key_filter: Option<String>,
    pub value_filter: Option<String>,
    pub json_key: Option<String>,
    pub json_value: Option<String>,
}

impl FetchParams {
    fn filter(&self) -> MessageFilter {
        MessageFilter {
            key_filter: self.key_filter.clone(),
            value_filter: self.value_filter.clone(),
            json_key_filter: self.json_key.clone(),
            json_value_filter: self.json_value.clone(),
        }
        .normalized()
    }
}

/// A message as the table renders it: the record plus a readable time.
#[derive(Serialize)]
pub struct MessageRow {
    #[serde(flatten)]
    pub message: Message,
    pub time: String,
}

impl From<Message> for MessageRow {
    fn from(message: Message) -> Self {
        let time = millis_to_rfc3339(message.timestamp);
        Self { message, time }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub partition: i32,
    pub offset: i64,
    pub beginning_offset: i64,
    pub end_offset: i64,
    pub messages: Vec<MessageRow>,
}

pub async fn list_topics(State(engine): State<TopicLensEngine>) -> ApiResult<Vec<String>> {
    Ok(ApiResponse::ok(engine.cluster.topic_names()))
}

pub async fn create_topic(
    State(engine): State<TopicLensEngine>,
    Json(req): Json<CreateTopicRequest>,
) -> ApiResult<String> {
    engine.cluster.create_topic(&req.name, req.partitions)?;
    Ok(ApiResponse::created(req.name))
}

pub async fn describe_topic(
    State(engine): State<TopicLensEngine>,
    Path(topic): Path<String>,
) -> ApiResult<TopicDetail> {
    let partitions = engine.cluster.topic(&topic)?.bounds();
    let groups = engine.cluster.groups_for_topic(&topic);
    Ok(ApiResponse::ok(TopicDetail { name: topic, partitions, groups }))
}

pub async fn fetch_messages(
    State(engine): State<TopicLensEngine>,
    Path(topic): Path<String>,
    Query(params): Query<FetchParams>,
) -> ApiResult<MessagePage> {
    let count = params
        .count
        .unwrap_or(engine.inspector.default_fetch_count)
        .min(engine.inspector.max_fetch_count);

    let start = match params.offset {
        Some(offset) => StartAt::Offset(offset),
        None => StartAt::Policy(OffsetPolicy {
            mode: params.auto_offset_reset.unwrap_or(OffsetMode::Newest),
            count: count as i64,
        }),
    };

    let pulled = engine
        .fetcher
        .pull(PullRequest {
            topic,
            partition: params.partition.unwrap_or(0),
            start,
            count,
            filter: params.filter(),
        })
        .await?;

    Ok(ApiResponse::ok(MessagePage {
        partition: pulled.bounds.partition,
        offset: pulled.offset,
        beginning_offset: pulled.bounds.beginning_offset,
        end_offset: pulled.bounds.end_offset,
        messages: pulled.messages.into_iter().map(MessageRow::from).collect(),
    }))
}

pub async fn produce_message(
    State(engine): State<TopicLensEngine>,
    Path(topic): Path<String>,
    Json(record): Json<ProduceRecord>,
) -> ApiResult<ProduceAck> {
    let ack = engine.cluster.produce(&topic, record)?;
    Ok(ApiResponse::created(ack))
}
