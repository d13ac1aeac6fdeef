//! Live Session Registry: independent tail sessions keyed by view id.
//!
//! Sessions share no state. Reopening an existing id restarts that session,
//! which stops its previous subscription first.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::inspector::error::{InspectorError, Result};
use crate::inspector::live::{LiveTailSession, LiveTailSnapshot};
use crate::inspector::message::MessageFilter;
use crate::inspector::source::TopicDataSource;

pub struct LiveSessionRegistry {
    source: Arc<dyn TopicDataSource>,
    sessions: DashMap<Uuid, Arc<LiveTailSession>>,
    capacity: usize,
}

impl LiveSessionRegistry {
    pub fn new(source: Arc<dyn TopicDataSource>, capacity: usize) -> Self {
        Self {
            source,
            sessions: DashMap::new(),
            capacity,
        }
    }

    pub async fn open(
        &self,
        view_id: Option<Uuid>,
        topic: &str,
        partition: i32,
        filter: MessageFilter,
    ) -> Result<Uuid> {
        let id = view_id.unwrap_or_else(Uuid::new_v4);
        // Clone out of the map so no shard lock is held across the await.
        let session = self
            .sessions
            .entry(id)
            .or_insert_with(|| LiveTailSession::new(self.capacity))
            .clone();

        session.stop();
        session.start(self.source.as_ref(), topic, partition, filter).await?;
        info!(session = %id, topic, partition, "[Registry] Live session opened");
        Ok(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<LiveTailSession>> {
        self.sessions.get(id).map(|s| s.clone())
    }

    pub fn snapshot(&self, id: &Uuid) -> Result<LiveTailSnapshot> {
        self.get(id)
            .map(|s| s.snapshot())
            .ok_or_else(|| InspectorError::InvalidState(format!("live session {} not found", id)))
    }

    pub fn stop(&self, id: &Uuid) -> bool {
        match self.get(id) {
            Some(session) => {
                session.stop();
                true
            }
            None => false,
        }
    }

    /// Stops and forgets the session.
    pub fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.stop();
                info!(session = %id, "[Registry] Live session removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stop_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().stop();
        }
    }
}
