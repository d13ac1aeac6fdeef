//! Live Tail Session: one cancellable subscription feeding a sliding window.
//!
//! State machine: Idle -> Connecting -> Open -> Closed, with Open -> Error -> Closed
//! on transport failure. Every mutation happens under the session mutex and is
//! tagged with a subscription generation; `stop` bumps the generation before
//! returning, so deliveries from a revoked subscription are dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::inspector::error::{InspectorError, Result};
use crate::inspector::message::{Message, MessageFilter, PartitionBounds};
use crate::inspector::source::{LiveBatch, LiveEvent, SubscriptionHandle, TopicDataSource};

pub const DEFAULT_LIVE_CAPACITY: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Error,
    Closed,
}

// ==========================================
// SLIDING WINDOW
// ==========================================

/// Fixed-capacity FIFO. Appending past capacity evicts from the front.
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl LiveBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, incoming: I) {
        for msg in incoming {
            if self.messages.len() == self.capacity {
                self.messages.pop_front();
            }
            self.messages.push_back(msg);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

// ==========================================
// EVENTS & SNAPSHOTS
// ==========================================

/// What observers of a session see, in delivery order.
#[derive(Debug, Clone)]
pub enum TailEvent {
    Batch(LiveBatch),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTailSnapshot {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub filter: MessageFilter,
    pub status: ConnectionStatus,
    pub bounds: Option<PartitionBounds>,
    pub messages: Vec<Message>,
    pub last_error: Option<String>,
}

// ==========================================
// SESSION
// ==========================================

struct TailState {
    status: ConnectionStatus,
    topic: Option<String>,
    partition: Option<i32>,
    filter: MessageFilter,
    buffer: LiveBuffer,
    bounds: Option<PartitionBounds>,
    generation: u64,
    handle: Option<Box<dyn SubscriptionHandle>>,
    pump: Option<JoinHandle<()>>,
    last_error: Option<String>,
}

/// Resources detached from the state, released outside the lock.
struct Released {
    handle: Option<Box<dyn SubscriptionHandle>>,
    pump: Option<JoinHandle<()>>,
}

impl Released {
    fn release(self, abort_pump: bool) {
        if let Some(handle) = self.handle {
            handle.close();
        }
        if let Some(pump) = self.pump {
            if abort_pump {
                pump.abort();
            }
        }
    }
}

pub struct LiveTailSession {
    state: Mutex<TailState>,
    events: broadcast::Sender<TailEvent>,
}

impl LiveTailSession {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(TailState {
                status: ConnectionStatus::Idle,
                topic: None,
                partition: None,
                filter: MessageFilter::default(),
                buffer: LiveBuffer::new(capacity),
                bounds: None,
                generation: 0,
                handle: None,
                pump: None,
                last_error: None,
            }),
            events,
        })
    }

    /// Opens a subscription at "now". Only valid from Idle or Closed.
    pub async fn start(
        self: &Arc<Self>,
        source: &dyn TopicDataSource,
        topic: &str,
        partition: i32,
        filter: MessageFilter,
    ) -> Result<()> {
        let filter = filter.normalized();
        let generation = {
            let mut state = self.state.lock();
            if !matches!(state.status, ConnectionStatus::Idle | ConnectionStatus::Closed) {
                return Err(InspectorError::InvalidState(format!(
                    "cannot start a live session in state {:?}",
                    state.status
                )));
            }
            state.generation += 1;
            state.status = ConnectionStatus::Connecting;
            state.topic = Some(topic.to_string());
            state.partition = Some(partition);
            state.filter = filter.clone();
            state.buffer.clear();
            state.bounds = None;
            state.last_error = None;
            state.generation
        };

        info!(topic, partition, "[LiveTail] Connecting");

        let subscription = match source.open_live_subscription(topic, partition, &filter).await {
            Ok(sub) => sub,
            Err(err) => {
                let err = match err {
                    e @ InspectorError::Subscription { .. } => e,
                    other => InspectorError::subscription(other.to_string()),
                };
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.status = ConnectionStatus::Error;
                    state.last_error = Some(err.to_string());
                    let released = Self::release_locked(&mut state);
                    drop(state);
                    released.release(true);
                    let _ = self.events.send(TailEvent::Error(err.to_string()));
                    let _ = self.events.send(TailEvent::Closed);
                }
                warn!(topic, partition, error = %err, "[LiveTail] Failed to open subscription");
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        if state.generation != generation || state.status != ConnectionStatus::Connecting {
            // Stopped while the subscription was opening.
            drop(state);
            subscription.handle.close();
            debug!(topic, partition, "[LiveTail] Discarded subscription opened after stop");
            return Ok(());
        }

        let pump = tokio::spawn(pump_events(Arc::downgrade(self), generation, subscription.events));
        state.handle = Some(subscription.handle);
        state.pump = Some(pump);
        state.status = ConnectionStatus::Open;
        info!(topic, partition, "[LiveTail] Open");
        Ok(())
    }

    /// Appends a pushed batch and overwrites the bounds in one step.
    /// Rejected unless the session is open.
    pub fn on_batch(&self, batch: LiveBatch) -> Result<usize> {
        self.apply_batch(None, batch)
    }

    /// Moves an open or connecting session to Error, releases it and returns
    /// the error to surface. `None` if the session was not live.
    ///
    /// Error is transient: `status()` settles in Closed before this returns.
    /// The failure stays visible through `last_error` in the snapshot and the
    /// `TailEvent::Error` event.
    pub fn on_error(&self, reason: impl Into<String>) -> Option<InspectorError> {
        self.fail(None, reason.into())
    }

    /// Idempotent. After it returns, nothing from the revoked subscription
    /// can mutate the session.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if matches!(state.status, ConnectionStatus::Idle | ConnectionStatus::Closed) {
            return;
        }
        let released = Self::release_locked(&mut state);
        let topic = state.topic.clone().unwrap_or_default();
        let partition = state.partition;
        drop(state);

        released.release(true);
        let _ = self.events.send(TailEvent::Closed);
        info!(topic = %topic, partition = ?partition, "[LiveTail] Stopped");
    }

    /// Drops buffered messages without touching the subscription.
    pub fn clear(&self) {
        self.state.lock().buffer.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TailEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    pub fn bounds(&self) -> Option<PartitionBounds> {
        self.state.lock().bounds
    }

    pub fn buffer_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().buffer.to_vec()
    }

    pub fn snapshot(&self) -> LiveTailSnapshot {
        let state = self.state.lock();
        LiveTailSnapshot {
            topic: state.topic.clone(),
            partition: state.partition,
            filter: state.filter.clone(),
            status: state.status,
            bounds: state.bounds,
            messages: state.buffer.to_vec(),
            last_error: state.last_error.clone(),
        }
    }

    // --- Internal ---

    fn release_locked(state: &mut TailState) -> Released {
        state.generation += 1;
        state.status = ConnectionStatus::Closed;
        Released {
            handle: state.handle.take(),
            pump: state.pump.take(),
        }
    }

    /// `expected`: generation of the delivering subscription, `None` for direct calls.
    fn apply_batch(&self, expected: Option<u64>, batch: LiveBatch) -> Result<usize> {
        let bounds = batch.bounds();
        let LiveBatch { partition, beginning_offset, end_offset, messages } = batch;
        let decoded: Vec<Message> = messages.into_iter().map(Message::decoded).collect();
        let count = decoded.len();

        let mut state = self.state.lock();
        if expected.is_some_and(|g| g != state.generation) || state.status != ConnectionStatus::Open {
            return Err(InspectorError::InvalidState("live session is not open".into()));
        }
        if state.partition.is_some_and(|p| p != partition) {
            return Err(InspectorError::InvalidCommand(format!(
                "batch for partition {} delivered to session on partition {:?}",
                partition, state.partition
            )));
        }

        let notify = self.events.receiver_count() > 0;
        let forwarded = notify.then(|| decoded.clone());

        state.buffer.extend(decoded);
        state.bounds = Some(bounds);

        if let Some(messages) = forwarded {
            let _ = self.events.send(TailEvent::Batch(LiveBatch {
                partition,
                beginning_offset,
                end_offset,
                messages,
            }));
        }
        Ok(count)
    }

    fn fail(&self, expected: Option<u64>, reason: String) -> Option<InspectorError> {
        let mut state = self.state.lock();
        if expected.is_some_and(|g| g != state.generation)
            || !matches!(state.status, ConnectionStatus::Connecting | ConnectionStatus::Open)
        {
            return None;
        }

        state.status = ConnectionStatus::Error;
        state.last_error = Some(reason.clone());
        let released = Self::release_locked(&mut state);
        let topic = state.topic.clone().unwrap_or_default();
        drop(state);

        // The pump may be the caller; detach instead of aborting it.
        released.release(expected.is_none());
        warn!(topic = %topic, reason = %reason, "[LiveTail] Subscription failed, session closed");
        let _ = self.events.send(TailEvent::Error(reason.clone()));
        let _ = self.events.send(TailEvent::Closed);
        Some(InspectorError::subscription(reason))
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation || state.status != ConnectionStatus::Open {
            return;
        }
        let released = Self::release_locked(&mut state);
        drop(state);
        released.release(false);
        let _ = self.events.send(TailEvent::Closed);
        debug!("[LiveTail] Source closed the subscription");
    }
}

impl Drop for LiveTailSession {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(handle) = state.handle.take() {
            handle.close();
        }
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
    }
}

/// Single writer per subscription: events are applied strictly in arrival order.
async fn pump_events(session: Weak<LiveTailSession>, generation: u64, mut events: mpsc::Receiver<LiveEvent>) {
    while let Some(event) = events.recv().await {
        let Some(session) = session.upgrade() else {
            return;
        };
        match event {
            LiveEvent::Batch(batch) => {
                if session.apply_batch(Some(generation), batch).is_err() {
                    return;
                }
            }
            LiveEvent::Error(reason) => {
                session.fail(Some(generation), reason);
                return;
            }
            LiveEvent::Closed => {
                session.finish(generation);
                return;
            }
        }
    }

    if let Some(session) = session.upgrade() {
        session.finish(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(range: std::ops::RangeInclusive<i64>) -> Vec<Message> {
        range.map(|i| Message::new(0, i, None, format!("m{}", i), 0)).collect()
    }

    #[test]
    fn test_buffer_keeps_last_capacity_in_order() {
        let mut buffer = LiveBuffer::new(100);
        buffer.extend(numbered(1..=40));
        buffer.extend(numbered(41..=80));
        buffer.extend(numbered(81..=120));

        assert_eq!(buffer.len(), 100);
        let offsets: Vec<i64> = buffer.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, (21..=120).collect::<Vec<_>>());
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let mut buffer = LiveBuffer::new(7);
        for chunk in 0..30 {
            buffer.extend(numbered(chunk * 5..=chunk * 5 + 4));
            assert!(buffer.len() <= 7);
        }
        let offsets: Vec<i64> = buffer.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, (143..=149).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = LiveBuffer::new(0);
        buffer.extend(numbered(1..=3));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.to_vec()[0].offset, 3);
    }

    #[test]
    fn test_idle_session_rejects_batches_and_ignores_stop() {
        let session = LiveTailSession::new(DEFAULT_LIVE_CAPACITY);
        session.stop();
        session.stop();
        assert_eq!(session.status(), ConnectionStatus::Idle);

        let batch = LiveBatch { partition: 0, beginning_offset: 0, end_offset: 1, messages: numbered(0..=0) };
        assert!(matches!(session.on_batch(batch), Err(InspectorError::InvalidState(_))));
        assert_eq!(session.buffer_len(), 0);
        assert!(session.on_error("boom").is_none());
    }
}
