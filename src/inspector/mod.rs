pub mod error;
pub mod message;
pub mod offset;
pub mod filter;
pub mod source;
pub mod fetcher;
pub mod live;
pub mod registry;
pub mod group;

pub use error::{FetchReason, InspectorError, Result};
pub use fetcher::HistoricalFetcher;
pub use group::ConsumerGroupOffsetTracker;
pub use live::LiveTailSession;
pub use registry::LiveSessionRegistry;
