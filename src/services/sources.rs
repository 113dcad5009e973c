use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::RecommenderId;
use crate::stores::CategoryIndex;

/// A candidate drawn from one source, tagged for attribution
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedTitle {
    pub title: String,
    pub source: RecommenderId,
    /// Position the title held in its source's list (1-indexed)
    pub source_rank: usize,
}

/// One supplier of candidates to the filter stage
///
/// The filter draws from sources in a fresh shuffled order per slot; a source
/// consumes its candidates as they are drawn, per category.
#[async_trait]
pub trait RecommenderSource: Send {
    fn id(&self) -> RecommenderId;

    /// The next unconsumed candidate for `category`, or `None` when drained.
    /// `taken` holds the titles already accepted this aggregation.
    async fn next(
        &mut self,
        category: &str,
        taken: &HashSet<String>,
    ) -> AppResult<Option<SourcedTitle>>;
}

/// A ranked title list from one recommender, with an independent read cursor
/// per output category
pub struct ListSource {
    id: RecommenderId,
    items: Vec<String>,
    cursors: HashMap<String, usize>,
}

impl ListSource {
    pub fn new(id: RecommenderId, items: Vec<String>) -> Self {
        Self {
            id,
            items,
            cursors: HashMap::new(),
        }
    }
}

#[async_trait]
impl RecommenderSource for ListSource {
    fn id(&self) -> RecommenderId {
        self.id
    }

    async fn next(
        &mut self,
        category: &str,
        _taken: &HashSet<String>,
    ) -> AppResult<Option<SourcedTitle>> {
        let cursor = self.cursors.entry(category.to_string()).or_insert(0);
        if *cursor >= self.items.len() {
            return Ok(None);
        }

        let position = *cursor;
        *cursor += 1;
        Ok(Some(SourcedTitle {
            title: self.items[position].clone(),
            source: self.id,
            source_rank: position + 1,
        }))
    }
}

/// Uniform random draw from a category's membership, used when every ranked
/// list has run dry for that category
pub struct RandomFallback {
    index: Arc<dyn CategoryIndex>,
    lang: String,
    exclude: HashSet<String>,
    draws: usize,
}

impl RandomFallback {
    pub fn new(index: Arc<dyn CategoryIndex>, lang: String, exclude: HashSet<String>) -> Self {
        Self {
            index,
            lang,
            exclude,
            draws: 0,
        }
    }
}

#[async_trait]
impl RecommenderSource for RandomFallback {
    fn id(&self) -> RecommenderId {
        RecommenderId::Random
    }

    async fn next(
        &mut self,
        category: &str,
        taken: &HashSet<String>,
    ) -> AppResult<Option<SourcedTitle>> {
        let mut excluded = self.exclude.clone();
        excluded.extend(taken.iter().cloned());

        let member = self
            .index
            .random_member(&self.lang, category, &excluded)
            .await?;

        Ok(member.map(|title| {
            self.draws += 1;
            SourcedTitle {
                title,
                source: RecommenderId::Random,
                source_rank: self.draws,
            }
        }))
    }
}
