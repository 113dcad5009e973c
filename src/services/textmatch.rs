use std::collections::{HashMap, HashSet};

use crate::error::AppResult;
use crate::models::{Candidate, RecommenderId};
use crate::stores::MoreLikeSearch;

/// Parameters for the search-rank recommender
#[derive(Debug, Clone)]
pub struct TextMatchParams {
    /// Matches requested per basket item
    pub per_query_limit: usize,
    /// Larger bound used when the caller holds elevated rate limits
    pub elevated_limit: usize,
    pub elevated: bool,
}

impl Default for TextMatchParams {
    fn default() -> Self {
        Self {
            per_query_limit: 50,
            elevated_limit: 500,
            elevated: false,
        }
    }
}

/// Recommends items textually similar to the basket
///
/// Each basket item contributes one ranked "more-like" result list; lists are
/// merged by Borda count, so position `i` (1-indexed) in a list of `m`
/// matches is worth `m − i + 1` points, summed across lists. A failed query
/// is logged and skipped; the remaining lists still aggregate.
pub async fn recommend(
    search: &dyn MoreLikeSearch,
    lang: &str,
    basket: &[String],
    count: usize,
    params: &TextMatchParams,
) -> AppResult<Vec<Candidate>> {
    let limit = if params.elevated {
        params.elevated_limit
    } else {
        params.per_query_limit
    };
    let basket_set: HashSet<&str> = basket.iter().map(String::as_str).collect();

    let mut scores: HashMap<String, f64> = HashMap::new();
    for title in basket {
        let matches = match search.more_like(lang, title, limit).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "More-like query failed, skipping");
                continue;
            }
        };

        let m = matches.len();
        for (i, item) in matches.into_iter().enumerate() {
            // Borda: the top match in a list of m earns m points
            *scores.entry(item).or_insert(0.0) += (m - i) as f64;
        }
    }

    let mut candidates: Vec<Candidate> = scores
        .into_iter()
        .filter(|(title, _)| !basket_set.contains(title.as_str()))
        .map(|(title, score)| Candidate {
            title,
            score,
            source: RecommenderId::TextMatch,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    candidates.truncate(count);

    tracing::info!(
        queries = basket.len(),
        candidates = candidates.len(),
        "Search-rank recommendation completed"
    );

    Ok(candidates)
}
