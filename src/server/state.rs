use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::entities::{create_extractor, EntityExtractor};
use crate::error::GatewayError;
use crate::session::SessionStats;

/// Shared application state for the accept loop and handlers
#[derive(Clone)]
pub struct AppState {
    /// Active sessions (session_id -> stats handle). Inserted when a
    /// connection is accepted, removed on disconnect.
    pub sessions: Arc<RwLock<HashMap<String, Arc<RwLock<SessionStats>>>>>,

    pub config: Arc<Config>,

    /// The entity extractor shared by all sessions (stateless)
    pub extractor: Arc<dyn EntityExtractor>,

    /// Probed once at process start; advisory only, every `ready`
    /// re-attempts backend creation
    pub backend_available: bool,
}

impl AppState {
    pub fn new(config: Config, backend_available: bool) -> Result<Self, GatewayError> {
        let extractor = create_extractor(&config.extraction)?;

        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            extractor,
            backend_available,
        })
    }
}
