//! Entity extraction pipeline
//!
//! Runs incremental entity extraction over newly confirmed transcript
//! chunks and remaps the resulting spans into document coordinates:
//! - `types`: entity categories and span types
//! - `extractor`: the extraction service contract plus the HTTP and
//!   built-in lexicon implementations
//! - `pipeline`: task submission, index validation, and the client-visible
//!   merge set

pub mod extractor;
pub mod pipeline;
pub mod types;

pub use extractor::{create_extractor, EntityExtractor, HttpEntityExtractor, LexiconExtractor};
pub use pipeline::{EntityExtractionPipeline, EntitySet, ExtractionOutcome};
pub use types::{Entity, EntityCategory, RawEntity};
