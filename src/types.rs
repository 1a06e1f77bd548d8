use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque external identifier (user UUID, TMDB id, ...).
///
/// JSON numbers stay numbers and strings stay strings through every
/// artifact. Ordering puts integers first (ascending) and strings after
/// (lexicographic); dense index assignment relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "{n}"),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Int(n)
    }
}

impl From<i32> for Identifier {
    fn from(n: i32) -> Self {
        Identifier::Int(i64::from(n))
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Text(s.to_string())
    }
}

impl Identifier {
    /// Parse CLI input: integers become `Int`, anything else `Text`.
    pub fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(Identifier::Int)
            .unwrap_or_else(|_| Identifier::Text(raw.to_string()))
    }
}

/// One row of the interaction table, as stored upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInteraction {
    #[serde(rename = "userId")]
    pub user_id: Identifier,
    #[serde(rename = "tmdbId")]
    pub item_id: Identifier,
    /// Label source (WATCH_COMPLETE, CLICK, DISLIKE, ...). Kept verbatim.
    #[serde(rename = "interactionType", default)]
    pub interaction_type: String,
    /// Relevance in [0, 1].
    pub label: f32,
}

impl RawInteraction {
    pub fn new(
        user_id: impl Into<Identifier>,
        item_id: impl Into<Identifier>,
        interaction_type: &str,
        label: f32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            interaction_type: interaction_type.to_string(),
            label,
        }
    }
}

/// Dense training triple derived from a `RawInteraction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingExample {
    pub user_index: u32,
    pub item_index: u32,
    pub label: f32,
}

/// One exported item vector, keyed by the original item identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "tmdbId")]
    pub item_id: Identifier,
    pub embedding: Vec<f32>,
}

/// Stats returned from the extraction stage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExtractStats {
    pub interactions: usize,
    pub users: usize,
    pub items: usize,
    pub used_fallback: bool,
}

/// Stats returned from the upload stage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UploadStats {
    pub records: usize,
    pub chunks: usize,
}

/// Prototype dataset substituted for an empty extraction when opted in.
pub fn fallback_interactions() -> Vec<RawInteraction> {
    vec![
        RawInteraction::new("user-1", 550, "WATCH_COMPLETE", 1.0),
        RawInteraction::new("user-1", 27205, "CLICK", 0.5),
        RawInteraction::new("user-2", 550, "DISLIKE", 0.0),
        RawInteraction::new("user-2", 155, "WATCH_COMPLETE", 1.0),
        RawInteraction::new("user-3", 155, "CLICK", 0.5),
    ]
}

pub const EXIT_ERROR: i32 = 2;
