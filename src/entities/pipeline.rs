use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::extractor::EntityExtractor;
use super::types::{Entity, EntityCategory, RawEntity};

/// Completion of one extraction task, delivered on the pipeline's outcome
/// channel. Raw spans are still chunk-relative; the session remaps and
/// validates them against the confirmed text current at arrival time.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub sequence: u64,
    /// Recording generation the chunk belongs to; results from before a
    /// transcript reset are discarded on arrival
    pub epoch: u64,
    pub chunk_offset: usize,
    pub entities: Vec<RawEntity>,
}

/// Runs entity extraction for one session.
///
/// Each submitted chunk covers a disjoint range of the confirmed text:
/// the caller assigns `chunk_offset` from its processed offset
/// synchronously at submission time, so completions are safe to apply in
/// any order. A failed extraction degrades to zero entities; transcript
/// flow is never affected.
pub struct EntityExtractionPipeline {
    extractor: Arc<dyn EntityExtractor>,
    outcome_tx: mpsc::Sender<ExtractionOutcome>,
    next_sequence: u64,
}

impl EntityExtractionPipeline {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        outcome_tx: mpsc::Sender<ExtractionOutcome>,
    ) -> Self {
        Self {
            extractor,
            outcome_tx,
            next_sequence: 0,
        }
    }

    /// Submit newly confirmed text starting at `chunk_offset`.
    ///
    /// The call returns immediately; the outcome arrives on the channel
    /// when the extraction resolves, or is dropped silently if the session
    /// is gone by then.
    pub fn submit(&mut self, epoch: u64, chunk_text: String, chunk_offset: usize) -> JoinHandle<()> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let extractor = Arc::clone(&self.extractor);
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let entities = match extractor.extract(&chunk_text).await {
                Ok(entities) => entities,
                Err(e) => {
                    warn!(
                        "extraction failed for chunk at offset {}: {}; continuing with no entities",
                        chunk_offset, e
                    );
                    Vec::new()
                }
            };

            let outcome = ExtractionOutcome {
                sequence,
                epoch,
                chunk_offset,
                entities,
            };

            if outcome_tx.send(outcome).await.is_err() {
                debug!(
                    "session gone before extraction result {} could be delivered",
                    sequence
                );
            }
        })
    }
}

/// The client-visible entity set for one session.
///
/// Keyed by exact `[start, end)` range: a new batch supersedes an existing
/// entity at the identical range, while disjoint (and overlapping but not
/// identical) ranges accumulate.
#[derive(Debug, Default)]
pub struct EntitySet {
    entries: BTreeMap<(usize, usize), Entity>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remap a batch of chunk-relative spans by `chunk_offset`, validate
    /// them against the current confirmed text, and merge the survivors.
    /// Returns how many entities were accepted.
    pub fn apply_batch(
        &mut self,
        batch: Vec<RawEntity>,
        chunk_offset: usize,
        confirmed: &str,
    ) -> usize {
        let mut accepted = 0;
        for raw in batch {
            if let Some(entity) = validate(raw, chunk_offset, confirmed) {
                self.entries
                    .insert((entity.start_index, entity.end_index), entity);
                accepted += 1;
            }
        }
        accepted
    }

    /// All entities, ordered by start index
    pub fn entities(&self) -> Vec<Entity> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard all entities for a new recording
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Remap one raw span into document coordinates, rejecting anything the
/// service got wrong: unknown category, negative/inverted/out-of-range
/// indices, indices that split a UTF-8 character, or a reported text that
/// disagrees with the document bytes at the remapped span.
fn validate(raw: RawEntity, chunk_offset: usize, confirmed: &str) -> Option<Entity> {
    let Some(category) = EntityCategory::parse(&raw.category) else {
        warn!("dropping entity with unrecognized category {:?}", raw.category);
        return None;
    };

    if raw.start_index < 0 || raw.end_index < 0 {
        warn!(
            "dropping entity {:?} with negative indices {}..{}",
            raw.text, raw.start_index, raw.end_index
        );
        return None;
    }

    let start = chunk_offset.checked_add(raw.start_index as usize)?;
    let end = chunk_offset.checked_add(raw.end_index as usize)?;

    if start >= end {
        warn!("dropping entity {:?} with inverted span {}..{}", raw.text, start, end);
        return None;
    }
    if end > confirmed.len()
        || !confirmed.is_char_boundary(start)
        || !confirmed.is_char_boundary(end)
    {
        warn!(
            "dropping entity {:?} with out-of-range span {}..{} (document length {})",
            raw.text,
            start,
            end,
            confirmed.len()
        );
        return None;
    }

    if confirmed[start..end] != raw.text {
        warn!(
            "dropping entity whose text {:?} does not match the document span {}..{}",
            raw.text, start, end
        );
        return None;
    }

    Some(Entity {
        text: raw.text,
        category,
        start_index: start,
        end_index: end,
    })
}
