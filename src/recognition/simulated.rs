use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::adapter::{Alternative, RecognitionEvent, RecognitionResult, RecognitionStream};

/// Delay between an accepted write and its simulated results
const RESPONSE_DELAY: Duration = Duration::from_millis(120);

const INTERIM_CONFIDENCE: f32 = 0.41;
const FINAL_CONFIDENCE: f32 = 0.93;

/// Queue depth beyond which `write` reports backpressure. Writes past the
/// mark are still queued; the return value is only a slow-down signal.
const COMMAND_QUEUE_HIGH_WATER: usize = 64;

/// Fixed utterances cycled through by the simulated recognizer, in order.
/// A fresh stream always starts at index 0.
pub const SIMULATED_PHRASES: &[&str] = &[
    "patient presents with fever and cough",
    "blood pressure one twenty over eighty",
    "administered five hundred milligrams of amoxicillin",
    "no known drug allergies reported",
    "follow up scheduled in two weeks",
];

enum SimCommand {
    Chunk,
    Finish,
}

/// Deterministic recognition stream used when no real backend is available.
///
/// A single worker serializes writes: for each accepted audio chunk it
/// emits one interim result (a leading fragment of the upcoming phrase)
/// followed by one final result drawn round-robin from the phrase list.
pub struct SimulatedStream {
    command_tx: mpsc::UnboundedSender<SimCommand>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
    ended: AtomicBool,
}

impl SimulatedStream {
    /// Start the generator worker. The first event on `events` is `Ready`.
    pub async fn spawn(events: mpsc::Sender<RecognitionEvent>) -> Self {
        info!("using simulated recognition stream");

        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicBool::new(true));

        let _ = events.send(RecognitionEvent::Ready { simulated: true }).await;

        tokio::spawn({
            let queued = Arc::clone(&queued);
            async move {
                let mut phrase_index = 0usize;

                while let Some(command) = command_rx.recv().await {
                    queued.fetch_sub(1, Ordering::SeqCst);
                    match command {
                        SimCommand::Finish => break,
                        SimCommand::Chunk => {
                            tokio::time::sleep(RESPONSE_DELAY).await;

                            let phrase =
                                SIMULATED_PHRASES[phrase_index % SIMULATED_PHRASES.len()];
                            phrase_index += 1;

                            let interim =
                                result_event(interim_fragment(phrase), INTERIM_CONFIDENCE, false);
                            if events.send(interim).await.is_err() {
                                break;
                            }

                            let fin = result_event(phrase.to_string(), FINAL_CONFIDENCE, true);
                            if events.send(fin).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                debug!("simulated recognition worker stopped");
            }
        });

        Self {
            command_tx,
            queued,
            active,
            ended: AtomicBool::new(false),
        }
    }
}

/// Leading half of the phrase, as an in-progress hypothesis
fn interim_fragment(phrase: &str) -> String {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let keep = words.len().div_ceil(2);
    words[..keep].join(" ")
}

fn result_event(transcript: String, confidence: f32, is_final: bool) -> RecognitionEvent {
    RecognitionEvent::Result(RecognitionResult {
        alternatives: vec![Alternative {
            transcript,
            confidence,
        }],
        is_final,
    })
}

#[async_trait::async_trait]
impl RecognitionStream for SimulatedStream {
    fn write(&self, _pcm: &[u8]) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        // Count before sending so the worker's decrement can never observe
        // the counter at zero while the command is in the queue
        let depth = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.command_tx.send(SimCommand::Chunk).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
            return false;
        }
        if depth > COMMAND_QUEUE_HIGH_WATER {
            warn!(
                "simulated recognizer queue at depth {}; signaling backpressure",
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
        if self.command_tx.send(SimCommand::Finish).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            debug!("simulated recognition worker already stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
