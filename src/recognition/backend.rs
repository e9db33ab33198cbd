use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::adapter::{
    Alternative, RecognitionEvent, RecognitionResult, RecognitionSettings, RecognitionStream,
};
use crate::config::RecognitionConfig;
use crate::error::GatewayError;

/// Queue depth beyond which `write` reports backpressure. Frames past the
/// mark are still queued; the return value is only a slow-down signal.
const FRAME_QUEUE_HIGH_WATER: usize = 256;

/// Audio frame published to the speech service
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub language: String,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript result received from the speech service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    /// Ranked alternatives, best first
    pub alternatives: Vec<TranscriptAlternative>,
    pub partial: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptAlternative {
    pub transcript: String,
    pub confidence: f32,
}

enum FrameCommand {
    Audio(Vec<u8>),
    Finish,
}

/// Recognition stream bridged to the speech service over NATS.
///
/// A publisher task drains the frame queue onto `audio.frame.<session>`;
/// a subscriber task parses `stt.text.>` results for this session into
/// `RecognitionEvent`s.
pub struct NatsRecognitionStream {
    frame_tx: mpsc::UnboundedSender<FrameCommand>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
    ended: AtomicBool,
}

impl NatsRecognitionStream {
    pub async fn connect(
        url: &str,
        config: &RecognitionConfig,
        settings: &RecognitionSettings,
        session_id: &str,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<Self, GatewayError> {
        info!("connecting to recognition backend at {}", url);

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let client = tokio::time::timeout(connect_timeout, async_nats::connect(url))
            .await
            .map_err(|_| {
                GatewayError::BackendUnavailable(format!("timed out connecting to {}", url))
            })?
            .map_err(|e| {
                GatewayError::BackendUnavailable(format!("failed to connect to {}: {}", url, e))
            })?;

        let subscriber = client.subscribe("stt.text.>").await.map_err(|e| {
            GatewayError::BackendUnavailable(format!("failed to subscribe to transcripts: {}", e))
        })?;

        info!("recognition backend connected for session {}", session_id);

        let active = Arc::new(AtomicBool::new(true));
        let _ = events.send(RecognitionEvent::Ready { simulated: false }).await;

        // Subscriber task: parse result messages for this session
        let sub_task = tokio::spawn({
            let events = events.clone();
            let session_id = session_id.to_string();
            let active = Arc::clone(&active);
            let mut subscriber = subscriber;
            async move {
                while let Some(msg) = subscriber.next().await {
                    match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                        Ok(transcript) => {
                            if transcript.session_id != session_id {
                                continue;
                            }
                            let alternatives = transcript
                                .alternatives
                                .into_iter()
                                .map(|a| Alternative {
                                    transcript: a.transcript,
                                    confidence: a.confidence,
                                })
                                .collect();
                            let event = RecognitionEvent::Result(RecognitionResult {
                                alternatives,
                                is_final: !transcript.partial,
                            });
                            if events.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("failed to parse transcript message: {}", e);
                        }
                    }
                }
                if active.load(Ordering::SeqCst) {
                    let _ = events
                        .send(RecognitionEvent::Error {
                            message: "recognition backend connection closed".to_string(),
                        })
                        .await;
                }
            }
        });

        // Publisher task: drain the frame queue onto the audio subject,
        // then hold the subscriber open for the settle window so in-flight
        // results can still arrive
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        tokio::spawn({
            let session_id = session_id.to_string();
            let language = settings.language.clone();
            let sample_rate = settings.sample_rate;
            let channels = settings.channels;
            let settle = Duration::from_millis(config.stop_settle_ms);
            let queued = Arc::clone(&queued);
            async move {
                let subject = format!("audio.frame.{}", session_id);
                let mut sequence: u32 = 0;

                while let Some(command) = frame_rx.recv().await {
                    queued.fetch_sub(1, Ordering::SeqCst);
                    let (pcm, final_frame) = match command {
                        FrameCommand::Audio(bytes) => (bytes, false),
                        FrameCommand::Finish => (Vec::new(), true),
                    };

                    let message = AudioFrameMessage {
                        session_id: session_id.clone(),
                        sequence,
                        pcm: base64::engine::general_purpose::STANDARD.encode(&pcm),
                        sample_rate,
                        channels,
                        language: language.clone(),
                        timestamp: chrono::Utc::now().to_rfc3339(),
                        final_frame,
                    };
                    sequence += 1;

                    if let Err(e) = publish_frame(&client, &subject, &message).await {
                        error!("failed to publish audio frame: {}", e);
                    }

                    if final_frame {
                        break;
                    }
                }

                tokio::time::sleep(settle).await;
                sub_task.abort();
                debug!("recognition stream for session {} torn down", session_id);
            }
        });

        Ok(Self {
            frame_tx,
            queued,
            active,
            ended: AtomicBool::new(false),
        })
    }
}

async fn publish_frame(
    client: &async_nats::Client,
    subject: &str,
    message: &AudioFrameMessage,
) -> Result<()> {
    let payload = serde_json::to_vec(message).context("failed to serialize audio frame")?;
    client
        .publish(subject.to_string(), payload.into())
        .await
        .context("failed to publish audio frame")?;
    Ok(())
}

#[async_trait::async_trait]
impl RecognitionStream for NatsRecognitionStream {
    fn write(&self, pcm: &[u8]) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        // Count before sending so the publisher's decrement can never
        // observe the counter at zero while the frame is in the queue
        let depth = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.frame_tx.send(FrameCommand::Audio(pcm.to_vec())).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            return false;
        }
        if depth > FRAME_QUEUE_HIGH_WATER {
            warn!(
                "recognition frame queue at depth {}; signaling backpressure",
                depth
            );
            return false;
        }
        true
    }

    async fn end(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.frame_tx.send(FrameCommand::Finish).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            debug!("recognition publisher already stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "nats"
    }
}
