use serde::{Deserialize, Serialize};

use crate::entities::Entity;
use crate::recognition::{Alternative, RecognitionResult};

/// Control events sent by the client as JSON text frames.
///
/// Audio travels as binary frames, not JSON, and is fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Begin (or resume) a recognition stream for this session
    #[serde(rename_all = "camelCase")]
    Ready { language: Option<String> },

    /// Stop the active recognition stream, keeping the transcript
    Stop,

    /// Discard the transcript and entity set before the next recording
    StartNew,
}

/// Events pushed server -> client as JSON text frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Acknowledges `ready`; `simulation` reports whether the simulated
    /// recognizer was selected
    #[serde(rename_all = "camelCase")]
    Ready { status: String, simulation: bool },

    /// A recognition update, interim or final
    #[serde(rename_all = "camelCase")]
    Transcription { results: Vec<TranscriptionResult> },

    /// The merged entity set after an extraction batch resolved.
    /// `new_text_start_index` is where the batch's text begins in
    /// `confirmed_text`.
    #[serde(rename_all = "camelCase")]
    Entities {
        confirmed_text: String,
        entities: Vec<Entity>,
        new_text_start_index: usize,
    },

    /// Acknowledges `stop`
    #[serde(rename_all = "camelCase")]
    Stopped { message: String },

    /// Any failure the client should know about
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

impl From<&RecognitionResult> for TranscriptionResult {
    fn from(result: &RecognitionResult) -> Self {
        Self {
            alternatives: result.alternatives.clone(),
            is_final: result.is_final,
        }
    }
}
