//! Client-facing gateway
//!
//! This module owns the connection-accept loop:
//! - GET /ws - WebSocket upgrade; one session per connection
//! - GET /health - Health check with backend availability
//! - GET /sessions - Snapshot of all active sessions
//! - GET /sessions/:id - Snapshot of one session
//!
//! Text frames on the socket carry JSON protocol events; binary frames
//! carry raw audio bytes.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
