use tracing::debug;

use crate::recognition::RecognitionResult;

/// Maintains the authoritative transcript for one session.
///
/// The confirmed text only ever grows by appending final results, in
/// arrival order. The interim text holds the latest non-final hypothesis
/// and is replaced wholesale by each new one.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    confirmed: String,
    interim: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one recognition result.
    ///
    /// Only the first (highest-ranked) alternative is used. Returns `true`
    /// when the confirmed text grew, i.e. a non-empty final result was
    /// appended.
    pub fn on_result(&mut self, result: &RecognitionResult) -> bool {
        let Some(best) = result.alternatives.first() else {
            debug!("recognition result with no alternatives; ignoring");
            return false;
        };

        if best.transcript.is_empty() {
            self.interim.clear();
            return false;
        }

        if result.is_final {
            if !self.confirmed.is_empty() {
                self.confirmed.push(' ');
            }
            self.confirmed.push_str(&best.transcript);
            self.interim.clear();
            true
        } else {
            self.interim = best.transcript.clone();
            false
        }
    }

    /// The append-only concatenation of all final results so far
    pub fn confirmed_text(&self) -> &str {
        &self.confirmed
    }

    /// The latest non-final hypothesis, empty if none is pending
    pub fn interim_text(&self) -> &str {
        &self.interim
    }

    /// Discard the transcript for a new recording
    pub fn reset(&mut self) {
        self.confirmed.clear();
        self.interim.clear();
    }
}
