use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::protocol::{ClientCommand, ServerEvent, TranscriptionResult};
use super::stats::SessionStats;
use crate::config::RecognitionConfig;
use crate::entities::{
    EntityExtractionPipeline, EntityExtractor, EntitySet, ExtractionOutcome,
};
use crate::error::GatewayError;
use crate::recognition::{
    create_stream, RecognitionEvent, RecognitionSettings, RecognitionStream,
};
use crate::transcript::TranscriptAggregator;

/// How many queued events a session tolerates before producers are
/// backpressured
const EVENT_QUEUE_CAPACITY: usize = 256;

const OUTCOME_QUEUE_CAPACITY: usize = 64;

/// Lifecycle of one client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Idle,
    Ready,
    Streaming,
    Stopping,
    Closed,
}

/// Everything that can happen to a session, funneled through one queue
/// with the controller loop as the single consumer.
#[derive(Debug)]
pub enum SessionEvent {
    /// A JSON control frame from the client
    Command(ClientCommand),

    /// A binary audio frame from the client
    Audio(Vec<u8>),

    /// An event from the recognition stream tagged with the adapter
    /// generation it came from; stale generations are dropped
    Recognition {
        generation: u64,
        event: RecognitionEvent,
    },

    /// A resolved extraction task
    Extraction(ExtractionOutcome),

    /// The settle window after `stop` elapsed
    StopSettled { generation: u64 },

    /// The client connection is gone
    Disconnected,
}

/// Owns one client session: the recognition stream lifecycle, the
/// transcript, and the entity pipeline.
///
/// All session state is mutated from the single `run` loop; the
/// recognition forwarder, extraction tasks, and settle timers only ever
/// push events into the queue.
pub struct SessionController {
    config: SessionConfig,
    recognition: RecognitionConfig,
    state: SessionState,
    started_at: DateTime<Utc>,

    aggregator: TranscriptAggregator,
    last_processed_offset: usize,
    entity_set: EntitySet,
    pipeline: EntityExtractionPipeline,
    /// Bumped on `startNew`; extraction results from an older epoch are
    /// discarded on arrival
    epoch: u64,
    chunks_submitted: u64,

    adapter: Option<Box<dyn RecognitionStream>>,
    adapter_generation: u64,
    simulated: bool,
    stop_generation: u64,

    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    outbound: mpsc::Sender<ServerEvent>,
    stats: Arc<RwLock<SessionStats>>,
}

impl SessionController {
    /// Build a controller and the sender its connection feeds events into.
    pub fn new(
        config: SessionConfig,
        recognition: RecognitionConfig,
        extractor: Arc<dyn EntityExtractor>,
        outbound: mpsc::Sender<ServerEvent>,
        stats: Arc<RwLock<SessionStats>>,
    ) -> (Self, mpsc::Sender<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(OUTCOME_QUEUE_CAPACITY);
        let pipeline = EntityExtractionPipeline::new(extractor, outcome_tx);

        // Forward resolved extractions into the session queue
        tokio::spawn({
            let events_tx = events_tx.clone();
            async move {
                while let Some(outcome) = outcome_rx.recv().await {
                    if events_tx
                        .send(SessionEvent::Extraction(outcome))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });

        let controller = Self {
            config,
            recognition,
            state: SessionState::Idle,
            started_at: Utc::now(),
            aggregator: TranscriptAggregator::new(),
            last_processed_offset: 0,
            entity_set: EntitySet::new(),
            pipeline,
            epoch: 0,
            chunks_submitted: 0,
            adapter: None,
            adapter_generation: 0,
            simulated: false,
            stop_generation: 0,
            events_tx: events_tx.clone(),
            events_rx,
            outbound,
            stats,
        };

        (controller, events_tx)
    }

    /// Consume session events until the connection is gone.
    pub async fn run(mut self) {
        info!(session_id = %self.config.session_id, "session started");

        while let Some(event) = self.events_rx.recv().await {
            let keep_going = self.handle_event(event).await;
            self.refresh_stats().await;
            if !keep_going {
                break;
            }
        }

        // Defensive teardown in case the loop ended without a Disconnected
        if let Some(adapter) = self.adapter.take() {
            adapter.end().await;
        }

        info!(session_id = %self.config.session_id, "session closed");
    }

    async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command(ClientCommand::Ready { language }) => {
                self.handle_ready(language).await;
            }
            SessionEvent::Command(ClientCommand::Stop) => {
                self.handle_stop().await;
            }
            SessionEvent::Command(ClientCommand::StartNew) => {
                self.handle_start_new();
            }
            SessionEvent::Audio(bytes) => {
                self.handle_audio(bytes).await;
            }
            SessionEvent::Recognition { generation, event } => {
                if generation != self.adapter_generation {
                    debug!("dropping recognition event from a replaced stream");
                } else {
                    self.handle_recognition(event).await;
                }
            }
            SessionEvent::Extraction(outcome) => {
                self.handle_extraction(outcome).await;
            }
            SessionEvent::StopSettled { generation } => {
                self.handle_stop_settled(generation).await;
            }
            SessionEvent::Disconnected => {
                info!(session_id = %self.config.session_id, "client disconnected");
                if let Some(adapter) = self.adapter.take() {
                    adapter.end().await;
                }
                self.state = SessionState::Closed;
                return false;
            }
        }
        true
    }

    async fn handle_ready(&mut self, language: Option<String>) {
        // A new stream replaces any previous one; pending stop timers for
        // the old stream become stale
        self.stop_generation += 1;
        if let Some(old) = self.adapter.take() {
            old.end().await;
        }

        let settings = RecognitionSettings {
            language: language.unwrap_or_else(|| self.config.default_language.clone()),
            sample_rate: self.recognition.sample_rate,
            channels: self.recognition.channels,
        };

        self.adapter_generation += 1;
        let generation = self.adapter_generation;
        let (rec_tx, mut rec_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        tokio::spawn({
            let events_tx = self.events_tx.clone();
            async move {
                while let Some(event) = rec_rx.recv().await {
                    let wrapped = SessionEvent::Recognition { generation, event };
                    if events_tx.send(wrapped).await.is_err() {
                        break;
                    }
                }
            }
        });

        match create_stream(&self.recognition, settings, &self.config.session_id, rec_tx).await {
            Ok((stream, simulated)) => {
                info!(
                    session_id = %self.config.session_id,
                    backend = stream.name(),
                    "recognition stream created"
                );
                self.adapter = Some(stream);
                self.simulated = simulated;
                self.state = SessionState::Ready;
                self.emit(ServerEvent::Ready {
                    status: "success".to_string(),
                    simulation: simulated,
                })
                .await;
            }
            Err(e) => {
                // Not cached: the next `ready` re-attempts backend creation
                error!(session_id = %self.config.session_id, "failed to create recognition stream: {}", e);
                self.emit(ServerEvent::Error {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn handle_audio(&mut self, bytes: Vec<u8>) {
        if !matches!(self.state, SessionState::Ready | SessionState::Streaming) {
            self.emit(ServerEvent::Error {
                message: GatewayError::InvalidInput(
                    "no active recognition stream".to_string(),
                )
                .to_string(),
            })
            .await;
            return;
        }

        if bytes.is_empty() {
            self.emit(ServerEvent::Error {
                message: GatewayError::InvalidInput("empty audio chunk".to_string()).to_string(),
            })
            .await;
            return;
        }

        let Some(adapter) = &self.adapter else {
            self.emit(ServerEvent::Error {
                message: GatewayError::InvalidInput(
                    "no active recognition stream".to_string(),
                )
                .to_string(),
            })
            .await;
            return;
        };

        if !adapter.is_active() {
            self.emit(ServerEvent::Error {
                message: GatewayError::InvalidInput(
                    "no active recognition stream".to_string(),
                )
                .to_string(),
            })
            .await;
            return;
        }

        if adapter.write(&bytes) {
            if self.state == SessionState::Ready {
                self.state = SessionState::Streaming;
            }
        } else {
            // Fire-and-forget with monitoring: upstream capture is not
            // flow-controllable, so log and keep going. The frame is still
            // queued while the stream is active.
            warn!(
                session_id = %self.config.session_id,
                "recognition stream signaled backpressure"
            );
            if self.state == SessionState::Ready && adapter.is_active() {
                self.state = SessionState::Streaming;
            }
        }
    }

    async fn handle_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Ready { simulated } => {
                debug!(
                    session_id = %self.config.session_id,
                    simulated, "recognition stream ready"
                );
            }
            RecognitionEvent::Error { message } => {
                let was_stopping = self.state == SessionState::Stopping;
                error!(session_id = %self.config.session_id, "recognition stream error: {}", message);
                self.emit(ServerEvent::Error {
                    message: GatewayError::Stream(message).to_string(),
                })
                .await;
                if let Some(adapter) = self.adapter.take() {
                    adapter.end().await;
                }
                self.state = SessionState::Closed;
                if was_stopping {
                    // The pending settle timer is now stale; ack the stop
                    // so the client is not left waiting
                    self.emit(ServerEvent::Stopped {
                        message: "recognition stopped".to_string(),
                    })
                    .await;
                }
            }
            RecognitionEvent::Result(result) => {
                if !matches!(
                    self.state,
                    SessionState::Ready | SessionState::Streaming | SessionState::Stopping
                ) {
                    debug!("dropping recognition result outside an active stream");
                    return;
                }

                let appended = self.aggregator.on_result(&result);
                self.emit(ServerEvent::Transcription {
                    results: vec![TranscriptionResult::from(&result)],
                })
                .await;

                if appended {
                    self.submit_new_text();
                }
            }
        }
    }

    /// Submit the newly confirmed text for extraction.
    ///
    /// The chunk offset is taken from the processed offset and the offset
    /// advanced before the extraction resolves, so concurrent tasks always
    /// cover disjoint ranges of the confirmed text.
    fn submit_new_text(&mut self) {
        let confirmed = self.aggregator.confirmed_text();
        let chunk_offset = self.last_processed_offset;
        let chunk = confirmed[chunk_offset..].to_string();
        self.last_processed_offset = confirmed.len();

        if chunk.trim().is_empty() {
            debug!("no new text to extract");
            return;
        }

        self.chunks_submitted += 1;
        self.pipeline.submit(self.epoch, chunk, chunk_offset);
    }

    async fn handle_extraction(&mut self, outcome: ExtractionOutcome) {
        if outcome.epoch != self.epoch {
            debug!(
                "discarding extraction result {} from a previous recording",
                outcome.sequence
            );
            return;
        }

        let confirmed = self.aggregator.confirmed_text().to_string();
        let accepted =
            self.entity_set
                .apply_batch(outcome.entities, outcome.chunk_offset, &confirmed);
        debug!(
            session_id = %self.config.session_id,
            sequence = outcome.sequence,
            accepted, "extraction batch applied"
        );

        self.emit(ServerEvent::Entities {
            confirmed_text: confirmed,
            entities: self.entity_set.entities(),
            new_text_start_index: outcome.chunk_offset,
        })
        .await;
    }

    async fn handle_stop(&mut self) {
        match self.state {
            SessionState::Ready | SessionState::Streaming => {
                self.state = SessionState::Stopping;
                self.stop_generation += 1;
                let generation = self.stop_generation;
                let settle = self.config.stop_settle;
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(settle).await;
                    let _ = events_tx.send(SessionEvent::StopSettled { generation }).await;
                });
            }
            SessionState::Stopping => {
                // Ack already pending from the settle timer
                debug!(session_id = %self.config.session_id, "stop requested while already stopping");
            }
            SessionState::Idle | SessionState::Closed => {
                self.emit(ServerEvent::Stopped {
                    message: "recognition already stopped".to_string(),
                })
                .await;
            }
        }
    }

    async fn handle_stop_settled(&mut self, generation: u64) {
        if generation != self.stop_generation || self.state != SessionState::Stopping {
            debug!("ignoring stale stop timer");
            return;
        }

        if let Some(adapter) = self.adapter.take() {
            adapter.end().await;
        }
        self.state = SessionState::Closed;
        self.emit(ServerEvent::Stopped {
            message: "recognition stopped".to_string(),
        })
        .await;
    }

    fn handle_start_new(&mut self) {
        info!(session_id = %self.config.session_id, "starting new recording; discarding transcript");
        self.aggregator.reset();
        self.entity_set.clear();
        self.last_processed_offset = 0;
        self.epoch += 1;
    }

    async fn emit(&self, event: ServerEvent) {
        if self.outbound.send(event).await.is_err() {
            debug!("client gone; dropping outbound event");
        }
    }

    async fn refresh_stats(&self) {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let mut stats = self.stats.write().await;
        stats.state = self.state;
        stats.simulation = self.simulated;
        stats.duration_secs = duration.num_milliseconds() as f64 / 1000.0;
        stats.confirmed_len = self.aggregator.confirmed_text().len();
        stats.entity_count = self.entity_set.len();
        stats.chunks_submitted = self.chunks_submitted;
    }
}
