use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a finished streaming run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub task_id: String,

    /// When the channel started streaming
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run in seconds
    pub duration_secs: f64,

    /// Number of audio chunks transmitted
    pub chunks_sent: usize,

    /// Total audio bytes transmitted
    pub bytes_sent: u64,

    /// Number of inbound events delivered to the caller
    pub events_received: usize,
}
