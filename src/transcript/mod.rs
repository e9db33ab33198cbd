//! Transcript aggregation
//!
//! Reconciles the recognition backend's interim/final results into an
//! append-only confirmed transcript plus the latest unconfirmed fragment.

mod aggregator;

pub use aggregator::TranscriptAggregator;
