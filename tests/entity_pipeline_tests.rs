// Tests for entity span remapping, validation of untrusted service
// output, the exact-range merge rule, and pipeline task delivery.

use std::sync::Arc;

use scribe_gateway::entities::{
    EntityCategory, EntityExtractionPipeline, EntityExtractor, EntitySet, LexiconExtractor,
    RawEntity,
};
use scribe_gateway::GatewayError;
use tokio::sync::mpsc;

fn raw(text: &str, category: &str, start: i64, end: i64) -> RawEntity {
    RawEntity {
        text: text.to_string(),
        category: category.to_string(),
        start_index: start,
        end_index: end,
    }
}

#[test]
fn test_remap_into_document_coordinates() {
    // Chunk "fever and cough" starts at offset 23 of the document
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    let accepted = set.apply_batch(vec![raw("fever", "CONDITION", 0, 5)], 23, confirmed);

    assert_eq!(accepted, 1);
    let entities = set.entities();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].start_index, 23);
    assert_eq!(entities[0].end_index, 28);
    assert_eq!(&confirmed[23..28], "fever");
    assert_eq!(entities[0].category, EntityCategory::Condition);
}

#[test]
fn test_invalid_service_output_is_dropped() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    let batch = vec![
        raw("fever", "SYMPTOM", 0, 5),    // unknown category
        raw("fever", "CONDITION", 5, 5),  // empty span
        raw("fever", "CONDITION", 9, 4),  // inverted
        raw("fever", "CONDITION", -3, 5), // negative
        raw("cough", "CONDITION", 10, 900), // past end of document
    ];
    let accepted = set.apply_batch(batch, 23, confirmed);

    assert_eq!(accepted, 0);
    assert!(set.is_empty());
}

#[test]
fn test_text_disagreeing_with_document_span_is_dropped() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    // Plausible in-bounds indices, but the reported text does not match
    // the document bytes at the remapped span
    let accepted = set.apply_batch(vec![raw("chills", "CONDITION", 0, 5)], 23, confirmed);

    assert_eq!(accepted, 0);
    assert!(set.is_empty());
}

#[test]
fn test_emitted_text_always_matches_document_span() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    set.apply_batch(
        vec![
            raw("fever", "CONDITION", 0, 5),
            raw("wrong", "CONDITION", 10, 15),
        ],
        23,
        confirmed,
    );

    for entity in set.entities() {
        assert_eq!(&confirmed[entity.start_index..entity.end_index], entity.text);
    }
    assert_eq!(set.len(), 1);
}

#[test]
fn test_indices_splitting_a_character_are_dropped() {
    // "café" occupies bytes 0..5; byte 4 is inside the 'é'
    let confirmed = "café visit";
    let mut set = EntitySet::new();

    let accepted = set.apply_batch(vec![raw("caf", "PHI", 0, 4)], 0, confirmed);

    assert_eq!(accepted, 0);
}

#[test]
fn test_exact_range_match_is_superseded() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    set.apply_batch(vec![raw("fever", "CONDITION", 0, 5)], 23, confirmed);
    set.apply_batch(vec![raw("fever", "PHI", 0, 5)], 23, confirmed);

    let entities = set.entities();
    assert_eq!(entities.len(), 1, "identical ranges replace, never duplicate");
    assert_eq!(entities[0].category, EntityCategory::Phi);
}

#[test]
fn test_disjoint_ranges_accumulate_in_order() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    set.apply_batch(vec![raw("cough", "CONDITION", 10, 15)], 23, confirmed);
    set.apply_batch(vec![raw("fever", "CONDITION", 0, 5)], 23, confirmed);

    let entities = set.entities();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].text, "fever");
    assert_eq!(entities[1].text, "cough");
    assert!(entities[0].end_index <= entities[1].start_index);
}

#[test]
fn test_overlapping_but_not_identical_ranges_both_remain() {
    let confirmed = "patient complains of a fever and cough";
    let mut set = EntitySet::new();

    set.apply_batch(vec![raw("fever", "CONDITION", 0, 5)], 23, confirmed);
    set.apply_batch(vec![raw("fever and", "CONDITION", 0, 9)], 23, confirmed);

    assert_eq!(set.len(), 2);
}

#[test]
fn test_clear_discards_all_entities() {
    let confirmed = "fever";
    let mut set = EntitySet::new();

    set.apply_batch(vec![raw("fever", "CONDITION", 0, 5)], 0, confirmed);
    set.clear();

    assert!(set.is_empty());
}

struct FixedExtractor {
    entities: Vec<RawEntity>,
}

#[async_trait::async_trait]
impl EntityExtractor for FixedExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<RawEntity>, GatewayError> {
        Ok(self.entities.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct FailingExtractor;

#[async_trait::async_trait]
impl EntityExtractor for FailingExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<RawEntity>, GatewayError> {
        Err(GatewayError::Extraction("service offline".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn test_pipeline_delivers_outcomes_with_increasing_sequences() {
    let extractor = Arc::new(FixedExtractor {
        entities: vec![raw("fever", "CONDITION", 0, 5)],
    });
    let (outcome_tx, mut outcome_rx) = mpsc::channel(8);
    let mut pipeline = EntityExtractionPipeline::new(extractor, outcome_tx);

    pipeline.submit(0, "fever".to_string(), 0);
    pipeline.submit(0, "fever again".to_string(), 6);

    let first = outcome_rx.recv().await.expect("first outcome");
    let second = outcome_rx.recv().await.expect("second outcome");

    let mut sequences = [first.sequence, second.sequence];
    sequences.sort_unstable();
    assert_eq!(sequences, [0, 1]);
    assert_eq!(first.entities.len(), 1);
}

#[tokio::test]
async fn test_extraction_failure_degrades_to_zero_entities() {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(8);
    let mut pipeline = EntityExtractionPipeline::new(Arc::new(FailingExtractor), outcome_tx);

    pipeline.submit(0, "fever".to_string(), 0);

    let outcome = outcome_rx.recv().await.expect("outcome");
    assert!(outcome.entities.is_empty());
    assert_eq!(outcome.chunk_offset, 0);
}

#[tokio::test]
async fn test_late_result_with_no_receiver_is_discarded_quietly() {
    let extractor = Arc::new(FixedExtractor {
        entities: vec![raw("fever", "CONDITION", 0, 5)],
    });
    let (outcome_tx, outcome_rx) = mpsc::channel(8);
    let mut pipeline = EntityExtractionPipeline::new(extractor, outcome_tx);

    drop(outcome_rx);
    let task = pipeline.submit(0, "fever".to_string(), 0);

    task.await.expect("extraction task must not panic");
}

#[tokio::test]
async fn test_lexicon_extractor_finds_known_terms() {
    let extractor = LexiconExtractor;
    let text = "patient presents with fever and cough";

    let entities = extractor.extract(text).await.unwrap();

    assert_eq!(entities.len(), 2);
    for entity in &entities {
        let start = entity.start_index as usize;
        let end = entity.end_index as usize;
        assert_eq!(&text[start..end], entity.text);
        assert_eq!(entity.category, "CONDITION");
    }
    assert_eq!(entities[0].text, "fever");
    assert_eq!(entities[1].text, "cough");
}

#[tokio::test]
async fn test_lexicon_extractor_is_case_insensitive_and_word_bounded() {
    let extractor = LexiconExtractor;

    let entities = extractor.extract("Fever, then feverish").await.unwrap();

    assert_eq!(entities.len(), 1, "substrings of longer words must not match");
    assert_eq!(entities[0].text, "Fever");
    assert_eq!(entities[0].start_index, 0);
    assert_eq!(entities[0].end_index, 5);
}

#[tokio::test]
async fn test_lexicon_extractor_handles_multiword_terms() {
    let extractor = LexiconExtractor;
    let text = "blood pressure one twenty over eighty";

    let entities = extractor.extract(text).await.unwrap();

    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].text, "blood pressure");
    assert_eq!(entities[0].category, "PROCEDURE");
}
