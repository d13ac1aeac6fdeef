use std::fmt;

/// Structured reason codes for a failed one-shot pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReason {
    TopicNotFound(String),
    PartitionNotFound(i32),
    GroupNotFound(String),
    OffsetOutOfRange { offset: i64, beginning: i64, end: i64 },
    Transport(String),
}

impl FetchReason {
    pub fn code(&self) -> &'static str {
        match self {
            FetchReason::TopicNotFound(_) => "TOPIC_NOT_FOUND",
            FetchReason::PartitionNotFound(_) => "PARTITION_NOT_FOUND",
            FetchReason::GroupNotFound(_) => "GROUP_NOT_FOUND",
            FetchReason::OffsetOutOfRange { .. } => "OFFSET_OUT_OF_RANGE",
            FetchReason::Transport(_) => "TRANSPORT",
        }
    }
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchReason::TopicNotFound(topic) => write!(f, "topic '{}' not found", topic),
            FetchReason::PartitionNotFound(p) => write!(f, "partition {} not found", p),
            FetchReason::GroupNotFound(group) => write!(f, "consumer group '{}' not found", group),
            FetchReason::OffsetOutOfRange { offset, beginning, end } => {
                write!(f, "offset {} out of range [{}, {}]", offset, beginning, end)
            }
            FetchReason::Transport(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InspectorError {
    /// Partition metadata has beginning > end.
    #[error("invalid bounds for partition {partition}: beginning {beginning} > end {end}")]
    InvalidBounds { partition: i32, beginning: i64, end: i64 },

    #[error("fetch failed: {reason}")]
    Fetch { reason: FetchReason },

    #[error("subscription failed: {reason}")]
    Subscription { reason: String },

    #[error("offset {offset} outside [{beginning}, {end}]")]
    OutOfRange { offset: i64, beginning: i64, end: i64 },

    /// A multi-partition reset failed mid-way and these partitions could
    /// not be put back.
    #[error("reset left partitions {committed:?} committed: {reason}")]
    PartialReset { committed: Vec<i32>, reason: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl InspectorError {
    pub fn fetch(reason: FetchReason) -> Self {
        InspectorError::Fetch { reason }
    }

    pub fn subscription(reason: impl Into<String>) -> Self {
        InspectorError::Subscription { reason: reason.into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InspectorError::InvalidBounds { .. } => "INVALID_BOUNDS",
            InspectorError::Fetch { reason } => reason.code(),
            InspectorError::Subscription { .. } => "SUBSCRIPTION",
            InspectorError::OutOfRange { .. } => "OUT_OF_RANGE",
            InspectorError::PartialReset { .. } => "PARTIAL_RESET",
            InspectorError::InvalidState(_) => "INVALID_STATE",
            InspectorError::InvalidCommand(_) => "INVALID_COMMAND",
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectorError>;
