use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::{EntityCategory, RawEntity};
use crate::config::ExtractionConfig;
use crate::error::GatewayError;

/// Contract with the entity extraction service.
///
/// Returned spans are relative to the given text; callers must re-validate
/// them before use.
#[async_trait::async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, GatewayError>;

    /// Extractor name for logging
    fn name(&self) -> &str;
}

/// Create the extractor configured for this process: the HTTP service when
/// an endpoint is set, the built-in lexicon otherwise.
pub fn create_extractor(config: &ExtractionConfig) -> Result<Arc<dyn EntityExtractor>, GatewayError> {
    match &config.endpoint {
        Some(endpoint) => {
            info!("using entity extraction service at {}", endpoint);
            let extractor = HttpEntityExtractor::new(
                endpoint.clone(),
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(Arc::new(extractor))
        }
        None => {
            info!("no entity extraction endpoint configured; using lexicon extractor");
            Ok(Arc::new(LexiconExtractor))
        }
    }
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    entities: Vec<RawEntity>,
}

/// Client for the external entity extraction HTTP service
pub struct HttpEntityExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEntityExtractor {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Extraction(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait::async_trait]
impl EntityExtractor for HttpEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractRequest { text })
            .send()
            .await
            .map_err(|e| GatewayError::Extraction(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| GatewayError::Extraction(format!("service returned error: {}", e)))?;

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Extraction(format!("unparseable response: {}", e)))?;

        Ok(body.entities)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Terms recognized by the built-in fallback extractor. Lowercase,
/// non-overlapping.
const LEXICON: &[(&str, EntityCategory)] = &[
    ("john doe", EntityCategory::Phi),
    ("jane doe", EntityCategory::Phi),
    ("fever", EntityCategory::Condition),
    ("cough", EntityCategory::Condition),
    ("asthma", EntityCategory::Condition),
    ("allergies", EntityCategory::Condition),
    ("amoxicillin", EntityCategory::Medication),
    ("ibuprofen", EntityCategory::Medication),
    ("aspirin", EntityCategory::Medication),
    ("chest", EntityCategory::Anatomy),
    ("lungs", EntityCategory::Anatomy),
    ("abdomen", EntityCategory::Anatomy),
    ("blood pressure", EntityCategory::Procedure),
    ("x-ray", EntityCategory::Procedure),
    ("biopsy", EntityCategory::Procedure),
];

/// Deterministic extractor over a fixed medical vocabulary.
///
/// Used when no extraction service is configured, so the no-credentials
/// path still produces annotated transcripts. Matches are case-insensitive
/// on word boundaries; reported spans preserve the original casing.
pub struct LexiconExtractor;

#[async_trait::async_trait]
impl EntityExtractor for LexiconExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, GatewayError> {
        let haystack = text.to_ascii_lowercase();
        let mut entities = Vec::new();

        for (term, category) in LEXICON {
            for (start, matched) in haystack.match_indices(term) {
                let end = start + matched.len();
                if !on_word_boundary(&haystack, start, end) {
                    continue;
                }
                entities.push(RawEntity {
                    text: text[start..end].to_string(),
                    category: category.as_str().to_string(),
                    start_index: start as i64,
                    end_index: end as i64,
                });
            }
        }

        entities.sort_by_key(|e| (e.start_index, e.end_index));
        Ok(entities)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

fn on_word_boundary(haystack: &str, start: usize, end: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
}
