mod utils_payload;
mod utils_time;

pub use utils_payload::payload_to_text;
pub use utils_time::{millis_to_rfc3339, now_ms};
