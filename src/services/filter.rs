use std::collections::HashSet;

use rand::seq::SliceRandom;

use crate::error::{AppError, AppResult};
use crate::models::Recommendation;
use crate::services::lang::LangProfile;
use crate::services::sources::RecommenderSource;
use crate::stores::CategoryIndex;

/// Bound on consecutive random draws per slot; a category that cannot
/// produce a usable title within this many draws is treated as exhausted
const FALLBACK_ATTEMPTS: usize = 8;

fn shuffled<T>(mut items: Vec<T>) -> Vec<T> {
    items.shuffle(&mut rand::thread_rng());
    items
}

/// Merges the recommenders' ranked lists into a category-balanced result
///
/// Fills one slot per category per rank, drawing from the sources in a fresh
/// shuffled order each slot. A candidate is accepted when it has not been
/// emitted yet, is not excluded, does not look like a list/index page, and
/// verifiably belongs to the category; rejected candidates are consumed. When
/// every source runs dry for a category, a uniform random member fills the
/// slot; when even that fails, the whole aggregation fails fast.
pub async fn merge(
    index: &dyn CategoryIndex,
    profile: &LangProfile,
    lang: &str,
    sources: &mut [Box<dyn RecommenderSource>],
    fallback: &mut dyn RecommenderSource,
    categories: &[String],
    exclude: &HashSet<String>,
    per_category: usize,
) -> AppResult<Vec<Recommendation>> {
    let mut recs: Vec<Recommendation> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for rank in 1..=per_category {
        for category in shuffled(categories.iter().collect::<Vec<_>>()) {
            let mut chosen = None;

            'sources: for si in shuffled((0..sources.len()).collect::<Vec<_>>()) {
                while let Some(candidate) = sources[si].next(category, &seen).await? {
                    if seen.contains(&candidate.title)
                        || exclude.contains(&candidate.title)
                        || profile.excluded(&candidate.title)
                    {
                        continue;
                    }
                    if index.contains(lang, category, &candidate.title).await? {
                        chosen = Some(candidate);
                        break 'sources;
                    }
                }
            }

            if chosen.is_none() {
                for _ in 0..FALLBACK_ATTEMPTS {
                    match fallback.next(category, &seen).await? {
                        Some(candidate)
                            if !seen.contains(&candidate.title)
                                && !exclude.contains(&candidate.title)
                                && !profile.excluded(&candidate.title) =>
                        {
                            chosen = Some(candidate);
                            break;
                        }
                        Some(_) => continue,
                        None => break,
                    }
                }
            }

            let Some(candidate) = chosen else {
                tracing::error!(category = %category, rank = rank, "Category exhausted, aborting aggregation");
                return Err(AppError::CategoryExhausted(category.clone()));
            };

            seen.insert(candidate.title.clone());
            recs.push(Recommendation {
                title: candidate.title,
                category: category.clone(),
                rank,
                source: candidate.source,
                source_rank: candidate.source_rank,
                categories: Vec::new(),
            });
        }
    }

    // Tag every accepted title with all categories it belongs to, for display
    for rec in &mut recs {
        rec.categories = index.categories_of(lang, &rec.title).await?;
    }

    tracing::info!(
        categories = categories.len(),
        per_category = per_category,
        accepted = recs.len(),
        "Filter/merge completed"
    );

    Ok(recs)
}
