use thiserror::Error;

/// Failure taxonomy for the gateway.
///
/// Every failure is caught at the boundary where it occurs and converted
/// into a client `error` event or an empty result. None of these variants
/// crash a session; `BackendUnavailable` is fatal only to the `ready`
/// attempt that produced it.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No working recognition backend and simulation is disallowed.
    #[error("recognition backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The recognition backend signaled an error mid-stream.
    #[error("recognition stream error: {0}")]
    Stream(String),

    /// Malformed client input (bad audio payload, unparseable message).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The entity extraction call failed or returned unusable data.
    #[error("entity extraction failed: {0}")]
    Extraction(String),
}
