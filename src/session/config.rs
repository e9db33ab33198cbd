use std::time::Duration;

/// Configuration for one client session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-<uuid>")
    pub session_id: String,

    /// Language used when the client's `ready` does not name one
    pub default_language: String,

    /// How long to let already-sent audio finish round-tripping between
    /// `stop` and stream teardown
    pub stop_settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            default_language: "en-US".to_string(),
            stop_settle: Duration::from_millis(500),
        }
    }
}
