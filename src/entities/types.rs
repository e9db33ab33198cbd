use serde::{Deserialize, Serialize};

/// The categories the extraction service may label a span with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityCategory {
    Phi,
    Condition,
    Anatomy,
    Medication,
    Procedure,
}

impl EntityCategory {
    /// Parse a category label from service output. Anything outside the
    /// fixed set is rejected.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "PHI" => Some(Self::Phi),
            "CONDITION" => Some(Self::Condition),
            "ANATOMY" => Some(Self::Anatomy),
            "MEDICATION" => Some(Self::Medication),
            "PROCEDURE" => Some(Self::Procedure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phi => "PHI",
            Self::Condition => "CONDITION",
            Self::Anatomy => "ANATOMY",
            Self::Medication => "MEDICATION",
            Self::Procedure => "PROCEDURE",
        }
    }
}

/// A categorized span of confirmed text.
///
/// Indices are byte offsets into the full confirmed text, never into a
/// sub-chunk, with `start_index < end_index <= len(confirmed text)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub text: String,
    pub category: EntityCategory,
    pub start_index: usize,
    pub end_index: usize,
}

/// An entity as reported by the extraction service, relative to the chunk
/// it was extracted from.
///
/// Service output is untrusted: the category is free-form and the indices
/// may be negative, inverted, or out of range. Validation happens when the
/// span is remapped into document coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    pub text: String,
    pub category: String,
    pub start_index: i64,
    pub end_index: i64,
}
