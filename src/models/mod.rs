use std::fmt;

use serde::{Deserialize, Serialize};

pub mod history;

pub use history::AgingLog;

/// Canonical page identifier
pub type PageId = i64;

/// A wiki page under its canonical identity (redirects already resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub title: String,
}

/// The recommenders that can contribute a candidate, plus the uniform random
/// fallback used when every ranked list runs dry for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommenderId {
    CoEdit,
    Links,
    TextMatch,
    Random,
}

impl RecommenderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommenderId::CoEdit => "coedit",
            RecommenderId::Links => "links",
            RecommenderId::TextMatch => "textmatch",
            RecommenderId::Random => "random",
        }
    }
}

impl fmt::Display for RecommenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How neighbors are ranked when the co-edit recommender keeps its top-k
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Association,
    Cosine,
    Shared,
}

/// A candidate co-editor scored against the requesting user's basket.
/// Created per request, discarded after ranking, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub user: String,
    pub association: f64,
    pub shared: usize,
    pub cosine: f64,
}

/// An item one recommender proposes, with its score
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub score: f64,
    pub source: RecommenderId,
}

/// A candidate accepted into the final result set: assigned to an output
/// category and rank, tagged with the source that produced it and the
/// position it held in that source's list.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub category: String,
    pub rank: usize,
    pub source: RecommenderId,
    pub source_rank: usize,
    /// All categories the item belongs to, for display
    pub categories: Vec<String>,
}

/// A user's edit footprint: everything they have touched, plus the
/// prioritized basket that seeds the recommenders
#[derive(Debug, Clone, Default)]
pub struct UserActivity {
    pub all_edited: Vec<String>,
    pub basket: Vec<String>,
}

/// One row of the per-user recommendation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub age: i32,
}
