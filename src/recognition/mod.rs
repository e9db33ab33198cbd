//! Recognition stream adapter
//!
//! This module provides a uniform duplex interface over the speech
//! recognition backend:
//! - `backend`: bridge to the real speech service over NATS
//! - `simulated`: deterministic generator used when no backend is available
//! - `adapter`: the `RecognitionStream` contract and backend selection

pub mod adapter;
pub mod backend;
pub mod simulated;

pub use adapter::{
    create_stream, Alternative, RecognitionEvent, RecognitionResult, RecognitionSettings,
    RecognitionStream,
};
pub use backend::{AudioFrameMessage, NatsRecognitionStream, TranscriptMessage};
pub use simulated::{SimulatedStream, SIMULATED_PHRASES};
