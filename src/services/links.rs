use std::collections::{HashMap, HashSet};

use crate::error::AppResult;
use crate::models::{Candidate, PageId, RecommenderId};
use crate::services::lang::LangProfile;
use crate::stores::WikiGraph;

/// Floor for the idf denominator; inlink counts near the pivot would
/// otherwise divide by a value approaching zero
const IDF_EPSILON: f64 = 1e-3;

/// Parameters for the link recommender
#[derive(Debug, Clone)]
pub struct LinkParams {
    /// Maximum breadth-expansion depth
    pub depth: u32,
    /// How many pages go into one outbound-link fetch
    pub batch_size: usize,
    /// The "typical" inlink count N in the weighting `ln(N / |e³ − inlinks|)`
    pub typical_inlinks: f64,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            depth: 2,
            batch_size: 50,
            typical_inlinks: 1000.0,
        }
    }
}

/// Damped inverse-popularity factor for a candidate's inlink count
///
/// Suppresses both hub pages (huge inlink counts) and near-orphan pages
/// relative to a typical count, with the denominator clamped above epsilon at
/// the `e³` crossover.
pub fn idf_factor(inlinks: f64, typical: f64) -> f64 {
    let pivot = 3.0_f64.exp();
    let denom = (pivot - inlinks).abs().max(IDF_EPSILON);
    (typical / denom).ln()
}

/// Recommends items reachable from the basket through outbound links
///
/// Seeds are the basket titles resolved to canonical pages; the expansion
/// counts how often each page is hit, then re-weights hits by inverse link
/// popularity. Basket items are never part of the output.
pub async fn recommend(
    wiki: &dyn WikiGraph,
    profile: &LangProfile,
    lang: &str,
    basket: &[String],
    count: usize,
    params: &LinkParams,
) -> AppResult<Vec<Candidate>> {
    // Resolve the basket; unresolvable titles and double redirects drop out
    let seeds = wiki.resolve_titles(lang, basket).await?;
    if seeds.is_empty() {
        tracing::warn!(user_titles = basket.len(), "No basket title resolved, skipping link expansion");
        return Ok(Vec::new());
    }

    let seed_ids: HashSet<PageId> = seeds.iter().map(|p| p.id).collect();
    let mut hits: HashMap<PageId, u32> = seeds.iter().map(|p| (p.id, 0)).collect();
    let mut titles: HashMap<PageId, String> =
        seeds.iter().map(|p| (p.id, p.title.clone())).collect();

    // Breadth expansion: fetch outbound links of the frontier in fixed-size
    // batches until the candidate quota is met or the depth limit is reached
    let mut frontier: Vec<PageId> = seed_ids.iter().copied().collect();
    for depth in 0..params.depth {
        if frontier.is_empty() {
            break;
        }

        let mut discovered: Vec<PageId> = Vec::new();
        for chunk in frontier.chunks(params.batch_size) {
            let targets = wiki.links_from(lang, chunk).await?;
            for page in targets {
                if profile.excluded(&page.title) {
                    continue;
                }
                let entry = hits.entry(page.id).or_insert_with(|| {
                    discovered.push(page.id);
                    titles.insert(page.id, page.title.clone());
                    0
                });
                *entry += 1;
            }
        }

        tracing::debug!(
            depth = depth + 1,
            discovered = discovered.len(),
            total = hits.len(),
            "Link expansion round completed"
        );

        if hits.len() - seed_ids.len() >= count {
            break;
        }
        frontier = discovered;
    }

    // The basket itself is never recommended
    for id in &seed_ids {
        hits.remove(id);
    }

    if hits.is_empty() {
        return Ok(Vec::new());
    }

    // Re-weight by inverse popularity; pages missing from the inlink table
    // keep their raw hit count
    let ids: Vec<PageId> = hits.keys().copied().collect();
    let inlinks = wiki.inlink_counts(lang, &ids).await?;

    let mut candidates: Vec<Candidate> = hits
        .into_iter()
        .filter_map(|(id, hit_count)| {
            let factor = inlinks
                .get(&id)
                .map(|c| idf_factor(*c as f64, params.typical_inlinks))
                .unwrap_or(1.0);
            titles.get(&id).map(|title| Candidate {
                title: title.clone(),
                score: f64::from(hit_count) * factor,
                source: RecommenderId::Links,
            })
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
        seeds = seed_ids.len(),
        candidates = candidates.len(),
        "Link recommendation completed"
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use crate::services::lang;
    use crate::stores::MockWikiGraph;

    fn page(id: PageId, title: &str) -> Page {
        Page {
            id,
            title: title.to_string(),
        }
    }

    #[test]
    fn test_idf_factor_decreases_above_pivot() {
        let pivot = 3.0_f64.exp();
        let mut previous = f64::INFINITY;
        for inlinks in [pivot + 1.0, pivot + 10.0, pivot + 100.0, pivot + 1000.0] {
            let factor = idf_factor(inlinks, 1000.0);
            assert!(factor < previous);
            previous = factor;
        }
    }

    #[test]
    fn test_idf_factor_increases_below_pivot() {
        let mut previous = f64::NEG_INFINITY;
        for inlinks in [0.0, 5.0, 10.0, 15.0, 19.0] {
            let factor = idf_factor(inlinks, 1000.0);
            assert!(factor > previous);
            previous = factor;
        }
    }

    #[test]
    fn test_idf_factor_is_finite_at_the_crossover() {
        let factor = idf_factor(3.0_f64.exp(), 1000.0);
        assert!(factor.is_finite());
        // Clamped denominator makes the crossover the global maximum
        assert!(factor > idf_factor(0.0, 1000.0));
    }

    #[tokio::test]
    async fn test_basket_items_never_recommended() {
        let mut wiki = MockWikiGraph::new();
        wiki.expect_resolve_titles()
            .returning(|_, _| Ok(vec![page(1, "A"), page(2, "B")]));
        // A and B link to each other and to C
        wiki.expect_links_from()
            .returning(|_, _| Ok(vec![page(2, "B"), page(1, "A"), page(3, "C")]));
        wiki.expect_inlink_counts()
            .returning(|_, _| Ok(HashMap::new()));

        let profile = lang::profile("en").unwrap();
        let basket = vec!["A".to_string(), "B".to_string()];
        let candidates = recommend(&wiki, profile, "en", &basket, 10, &LinkParams::default())
            .await
            .unwrap();

        let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C"]);
    }

    #[tokio::test]
    async fn test_empty_inlink_table_keeps_raw_hit_counts() {
        let mut wiki = MockWikiGraph::new();
        wiki.expect_resolve_titles()
            .returning(|_, _| Ok(vec![page(1, "A")]));
        wiki.expect_links_from()
            .returning(|_, _| Ok(vec![page(2, "C"), page(3, "D")]));
        wiki.expect_inlink_counts()
            .returning(|_, _| Ok(HashMap::new()));

        let profile = lang::profile("en").unwrap();
        let params = LinkParams {
            depth: 1,
            ..LinkParams::default()
        };
        let candidates = recommend(&wiki, profile, "en", &["A".to_string()], 10, &params)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        for candidate in &candidates {
            assert!((candidate.score - 1.0).abs() < 1e-9);
            assert_eq!(candidate.source, RecommenderId::Links);
        }
    }

    #[tokio::test]
    async fn test_list_pages_are_excluded_from_expansion() {
        let mut wiki = MockWikiGraph::new();
        wiki.expect_resolve_titles()
            .returning(|_, _| Ok(vec![page(1, "A")]));
        wiki.expect_links_from().returning(|_, _| {
            Ok(vec![
                page(2, "List of lakes of Norway"),
                page(3, "1984"),
                page(4, "Fjord"),
            ])
        });
        wiki.expect_inlink_counts()
            .returning(|_, _| Ok(HashMap::new()));

        let profile = lang::profile("en").unwrap();
        let params = LinkParams {
            depth: 1,
            ..LinkParams::default()
        };
        let candidates = recommend(&wiki, profile, "en", &["A".to_string()], 10, &params)
            .await
            .unwrap();

        let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Fjord"]);
    }

    #[tokio::test]
    async fn test_popular_hubs_rank_below_typical_pages() {
        let mut wiki = MockWikiGraph::new();
        wiki.expect_resolve_titles()
            .returning(|_, _| Ok(vec![page(1, "A")]));
        wiki.expect_links_from()
            .returning(|_, _| Ok(vec![page(2, "Hub"), page(3, "Niche")]));
        wiki.expect_inlink_counts().returning(|_, ids| {
            let mut counts = HashMap::new();
            for id in ids {
                counts.insert(*id, if *id == 2 { 500_000 } else { 40 });
            }
            Ok(counts)
        });

        let profile = lang::profile("en").unwrap();
        let params = LinkParams {
            depth: 1,
            ..LinkParams::default()
        };
        let candidates = recommend(&wiki, profile, "en", &["A".to_string()], 10, &params)
            .await
            .unwrap();

        assert_eq!(candidates[0].title, "Niche");
        assert_eq!(candidates[1].title, "Hub");
    }

    #[tokio::test]
    async fn test_unresolvable_basket_yields_empty_result() {
        let mut wiki = MockWikiGraph::new();
        wiki.expect_resolve_titles().returning(|_, _| Ok(vec![]));
        wiki.expect_links_from().times(0);

        let profile = lang::profile("en").unwrap();
        let candidates = recommend(
            &wiki,
            profile,
            "en",
            &["Nonexistent".to_string()],
            10,
            &LinkParams::default(),
        )
        .await
        .unwrap();

        assert!(candidates.is_empty());
    }
}
