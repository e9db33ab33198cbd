use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use super::backend::NatsRecognitionStream;
use super::simulated::SimulatedStream;
use crate::config::RecognitionConfig;
use crate::error::GatewayError;

/// One recognition hypothesis, best first in a result's alternative list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
}

/// A partial or final transcript for an utterance segment.
///
/// Non-final results are likely to change; final results are never revised.
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Ranked alternatives, highest confidence first
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

/// Event emitted by a recognition stream.
///
/// Backend failures surface as `Error` events; nothing crosses the adapter
/// boundary as a panic.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    Ready { simulated: bool },
    Result(RecognitionResult),
    Error { message: String },
}

/// Parameters for one recognition stream instance.
#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub language: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Duplex handle to a recognition backend.
///
/// One instance spans one `ready` -> `stop`/`disconnect` cycle. Events are
/// delivered on the channel handed to `create_stream`.
#[async_trait::async_trait]
pub trait RecognitionStream: Send + Sync {
    /// Queue audio bytes for recognition.
    ///
    /// Returns `false` to signal backpressure (or a stream that is no
    /// longer active). While the stream is active the bytes are still
    /// queued regardless; the caller should slow down but must not block.
    fn write(&self, pcm: &[u8]) -> bool;

    /// Flush and close. Idempotent; no writes are accepted afterwards.
    /// Already-queued audio is still published before teardown.
    async fn end(&self);

    /// Whether the stream still accepts writes
    fn is_active(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Create a recognition stream for one session.
///
/// Attempts the real backend when one is configured, falling back to the
/// simulated generator unless simulation is disabled. The returned flag is
/// `true` when the simulated variant was selected. Failures are never
/// cached: every call re-attempts the backend.
pub async fn create_stream(
    config: &RecognitionConfig,
    settings: RecognitionSettings,
    session_id: &str,
    events: mpsc::Sender<RecognitionEvent>,
) -> Result<(Box<dyn RecognitionStream>, bool), GatewayError> {
    if let Some(url) = &config.nats_url {
        match NatsRecognitionStream::connect(url, config, &settings, session_id, events.clone())
            .await
        {
            Ok(stream) => return Ok((Box::new(stream), false)),
            Err(e) if config.allow_simulation => {
                warn!(
                    "recognition backend unavailable, falling back to simulation: {}",
                    e
                );
            }
            Err(e) => return Err(e),
        }
    } else if !config.allow_simulation {
        return Err(GatewayError::BackendUnavailable(
            "no recognition backend configured and simulation is disabled".to_string(),
        ));
    }

    let stream = SimulatedStream::spawn(events).await;
    Ok((Box::new(stream), true))
}
