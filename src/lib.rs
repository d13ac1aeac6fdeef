pub mod config;
pub mod inspector;
pub mod cluster;
pub mod dashboard;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use crate::cluster::InMemoryCluster;
use crate::config::{Config, InspectorConfig};
use crate::inspector::{ConsumerGroupOffsetTracker, HistoricalFetcher, LiveSessionRegistry};

// ========================================
// ENGINE (The Singleton)
// ========================================

/// Everything the HTTP layer needs. Cheap to clone (all fields are Arcs).
#[derive(Clone)]
pub struct TopicLensEngine {
    pub cluster: Arc<InMemoryCluster>,
    pub fetcher: HistoricalFetcher,
    pub groups: ConsumerGroupOffsetTracker,
    pub live: Arc<LiveSessionRegistry>,
    pub inspector: InspectorConfig,
    pub start_time: Instant,
}

impl TopicLensEngine {
    pub fn new(config: &Config) -> Self {
        let cluster = Arc::new(InMemoryCluster::new(config.cluster.clone()));

        Self {
            fetcher: HistoricalFetcher::new(cluster.clone(), cluster.clone()),
            groups: ConsumerGroupOffsetTracker::new(cluster.clone(), cluster.clone()),
            live: Arc::new(LiveSessionRegistry::new(cluster.clone(), config.inspector.live_buffer_capacity)),
            cluster,
            inspector: config.inspector.clone(),
            start_time: Instant::now(),
        }
    }
}
