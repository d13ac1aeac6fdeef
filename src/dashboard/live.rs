use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::dashboard::response::{self, ApiResponse, ApiResult};
use crate::inspector::live::{LiveTailSession, TailEvent};
use crate::inspector::message::MessageFilter;
use crate::TopicLensEngine;

const MESSAGE_EVENT: &str = "topic-message-event";
const ERROR_EVENT: &str = "topic-error-event";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveParams {
    pub partition: Option<i32>,
    pub key_filter: Option<String>,
    pub value_filter: Option<String>,
    pub json_key: Option<String>,
    pub json_value: Option<String>,
}

impl LiveParams {
    fn filter(&self) -> MessageFilter {
        MessageFilter {
            key_filter: self.key_filter.clone(),
            value_filter: self.value_filter.clone(),
            json_key_filter: self.json_key.clone(),
            json_value_filter: self.json_value.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub view_id: Option<Uuid>,
    pub topic: String,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub filter: MessageFilter,
}

#[derive(Serialize)]
pub struct OpenedSession {
    pub id: Uuid,
}

/// Stops the session when the SSE stream is dropped (client went away).
struct StopOnDrop(Arc<LiveTailSession>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

pub async fn stream_live(
    State(engine): State<TopicLensEngine>,
    Path(topic): Path<String>,
    Query(params): Query<LiveParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    let partition = params.partition.unwrap_or(0);
    let session = LiveTailSession::new(engine.inspector.live_buffer_capacity);
    // Subscribe before starting so the first batch is not missed.
    let events = session.subscribe();

    session
        .start(engine.cluster.as_ref(), &topic, partition, params.filter())
        .await
        .map_err(IntoResponse::into_response)?;

    tracing::debug!(topic = %topic, partition, "[Dashboard] SSE live stream attached");

    let guard = StopOnDrop(session);
    let stream = stream::unfold((events, guard), |(mut events, guard)| async move {
        loop {
            let event = match events.recv().await {
                Ok(TailEvent::Batch(batch)) => match Event::default().event(MESSAGE_EVENT).json_data(&batch) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "[Dashboard] Cannot encode live batch");
                        continue;
                    }
                },
                Ok(TailEvent::Error(reason)) => Event::default().event(ERROR_EVENT).data(reason),
                Ok(TailEvent::Closed) | Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "[Dashboard] SSE client lagging, events skipped");
                    continue;
                }
            };
            return Some((Ok(event), (events, guard)));
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn open_session(
    State(engine): State<TopicLensEngine>,
    Json(req): Json<OpenSessionRequest>,
) -> ApiResult<OpenedSession> {
    let id = engine.live.open(req.view_id, &req.topic, req.partition, req.filter).await?;
    Ok(ApiResponse::created(OpenedSession { id }))
}

pub async fn session_snapshot(State(engine): State<TopicLensEngine>, Path(id): Path<Uuid>) -> Response {
    match engine.live.get(&id) {
        Some(session) => ApiResponse::ok(session.snapshot()).into_response(),
        None => response::not_found(format!("live session {} not found", id)),
    }
}

pub async fn close_session(State(engine): State<TopicLensEngine>, Path(id): Path<Uuid>) -> Response {
    if engine.live.remove(&id) {
        ApiResponse::ok(OpenedSession { id }).into_response()
    } else {
        response::not_found(format!("live session {} not found", id))
    }
}
