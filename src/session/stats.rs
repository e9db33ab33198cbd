use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::controller::SessionState;

/// Observability snapshot of one session, refreshed by its controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: SessionState,

    /// Whether the simulated recognizer is in use
    pub simulation: bool,

    /// When the connection was accepted
    pub started_at: DateTime<Utc>,

    /// Connection age in seconds
    pub duration_secs: f64,

    /// Length of the confirmed transcript in bytes
    pub confirmed_len: usize,

    /// Entities currently visible to the client
    pub entity_count: usize,

    /// Extraction chunks submitted so far
    pub chunks_submitted: u64,
}

impl SessionStats {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: SessionState::Idle,
            simulation: false,
            started_at: Utc::now(),
            duration_secs: 0.0,
            confirmed_len: 0,
            entity_count: 0,
            chunks_submitted: 0,
        }
    }
}
