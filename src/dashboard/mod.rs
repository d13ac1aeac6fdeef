//! HTTP carrier: REST for pulls and group offsets, SSE for live tail.

pub mod server;
pub mod response;
pub mod topics;
pub mod live;
pub mod groups;
