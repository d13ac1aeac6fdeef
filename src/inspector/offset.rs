//! Starting-offset policy for historical pulls.

use serde::Deserialize;

use crate::inspector::error::Result;
use crate::inspector::message::PartitionBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMode {
    Earliest,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPolicy {
    pub mode: OffsetMode,
    pub count: i64,
}

impl OffsetPolicy {
    pub fn earliest(count: i64) -> Self {
        Self { mode: OffsetMode::Earliest, count }
    }

    pub fn newest(count: i64) -> Self {
        Self { mode: OffsetMode::Newest, count }
    }
}

/// `Newest` asks for the last `count` messages, clamped to the retained start.
pub fn resolve(bounds: &PartitionBounds, policy: &OffsetPolicy) -> Result<i64> {
    bounds.validate()?;
    let offset = match policy.mode {
        OffsetMode::Earliest => bounds.beginning_offset,
        OffsetMode::Newest => bounds
            .end_offset
            .saturating_sub(policy.count)
            .max(bounds.beginning_offset),
    };
    Ok(offset)
}
