pub mod config;
pub mod entities;
pub mod error;
pub mod recognition;
pub mod server;
pub mod session;
pub mod transcript;

pub use config::Config;
pub use entities::{Entity, EntityCategory, EntityExtractionPipeline, EntityExtractor, EntitySet};
pub use error::GatewayError;
pub use recognition::{RecognitionEvent, RecognitionResult, RecognitionStream};
pub use server::{create_router, AppState};
pub use session::{
    ClientCommand, ServerEvent, SessionConfig, SessionController, SessionEvent, SessionState,
    SessionStats,
};
pub use transcript::TranscriptAggregator;
