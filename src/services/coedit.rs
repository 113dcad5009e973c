use std::collections::{HashMap, HashSet};

use crate::error::AppResult;
use crate::models::{Candidate, Neighbor, RecommenderId, SimilarityMetric};
use crate::services::association::{self, AssociationParams};
use crate::stores::EditGraph;

/// Parameters for the co-edit recommender
#[derive(Debug, Clone)]
pub struct CoEditParams {
    /// Minimum number of distinct neighbors that must have touched an item
    /// before it becomes a candidate (τ)
    pub threshold: u32,
    /// Lower bound τ may back off to
    pub min_threshold: u32,
    /// Whether to decrement τ while the quota is unmet
    pub backoff: bool,
    /// Neighbors below this association are discarded outright
    pub min_association: f64,
    /// How many of the best neighbors contribute items
    pub max_neighbors: usize,
    /// Minor-only editors with at least this many total edits are skipped
    /// during discovery; a single minor edit by a low-activity user is still
    /// an informative signal, prolific gnoming is not.
    pub prolific_cutoff: i64,
    /// Which similarity ranks the neighbor list
    pub metric: SimilarityMetric,
    pub association: AssociationParams,
}

impl Default for CoEditParams {
    fn default() -> Self {
        Self {
            threshold: 3,
            min_threshold: 1,
            backoff: true,
            min_association: 0.0001,
            max_neighbors: 250,
            prolific_cutoff: 500,
            metric: SimilarityMetric::Association,
            association: AssociationParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ItemScore {
    weight: f64,
    supporters: u32,
}

/// Neighbor contributions accumulated once per request.
///
/// Backoff re-queries this state with a lower threshold instead of re-running
/// the expensive discovery and scoring steps.
pub struct ScoredNeighbors {
    items: HashMap<String, ItemScore>,
    neighbor_count: usize,
}

impl ScoredNeighbors {
    /// Keeps the top-k neighbors by the selected metric and accumulates their
    /// items. Basket items never enter the accumulator.
    fn accumulate(
        mut scored: Vec<(Neighbor, Vec<String>)>,
        basket: &HashSet<String>,
        params: &CoEditParams,
    ) -> Self {
        scored.sort_by(|(a, _), (b, _)| {
            metric_value(b, params.metric)
                .partial_cmp(&metric_value(a, params.metric))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(params.max_neighbors);

        let mut items: HashMap<String, ItemScore> = HashMap::new();
        for (neighbor, edited) in &scored {
            let value = metric_value(neighbor, params.metric);
            for title in edited {
                if basket.contains(title) {
                    continue;
                }
                let entry = items.entry(title.clone()).or_insert(ItemScore {
                    weight: 0.0,
                    supporters: 0,
                });
                entry.weight += value;
                entry.supporters += 1;
            }
        }

        Self {
            items,
            neighbor_count: scored.len(),
        }
    }

    /// Candidates whose distinct-neighbor count reaches `tau`, best first
    pub fn candidates_at(&self, tau: u32) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .items
            .iter()
            .filter(|(_, score)| score.supporters >= tau)
            .map(|(title, score)| Candidate {
                title: title.clone(),
                score: score.weight,
                source: RecommenderId::CoEdit,
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });

        candidates
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }
}

fn metric_value(neighbor: &Neighbor, metric: SimilarityMetric) -> f64 {
    match metric {
        SimilarityMetric::Association => neighbor.association,
        SimilarityMetric::Cosine => neighbor.cosine,
        SimilarityMetric::Shared => neighbor.shared as f64,
    }
}

/// Outcome of one co-edit run. An unmet quota is reported, never silently
/// truncated.
#[derive(Debug)]
pub struct CoEditResult {
    pub candidates: Vec<Candidate>,
    /// The threshold the run ended at, after any backoff
    pub final_threshold: u32,
    /// Whether the requested count was reached
    pub satisfied: bool,
}

/// Recommends items edited by users similar to the requesting user
///
/// Discovery and scoring run once; the threshold filter backs off over the
/// accumulated neighbor state until the quota is met or τ bottoms out. A
/// lookup failure stops discovery and the run continues on whatever was
/// already gathered.
pub async fn recommend(
    graph: &dyn EditGraph,
    lang: &str,
    user: &str,
    basket: &[String],
    count: usize,
    params: &CoEditParams,
) -> AppResult<CoEditResult> {
    let basket_set: HashSet<String> = basket.iter().cloned().collect();

    // Candidate discovery: editors of each basket item. Minor-only editors
    // qualify only while their total activity stays below the prolific cutoff.
    let mut seen: HashSet<String> = HashSet::new();
    let mut eligible: Vec<String> = Vec::new();
    'discovery: for title in basket {
        let editors = match graph.editors_of(lang, title).await {
            Ok(editors) => editors,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Editor lookup failed, continuing with partial neighbor set");
                break 'discovery;
            }
        };
        for editor in editors {
            if editor.user == user || !seen.insert(editor.user.clone()) {
                continue;
            }
            if editor.has_nonminor || editor.total_edits < params.prolific_cutoff {
                eligible.push(editor.user);
            }
        }
    }

    // Score each unique neighbor exactly once
    let mut scored: Vec<(Neighbor, Vec<String>)> = Vec::new();
    for candidate in eligible {
        let edits = match graph.edits_of(lang, &candidate).await {
            Ok(edits) => edits,
            Err(e) => {
                tracing::warn!(user = %candidate, error = %e, "Edit-set lookup failed, continuing with partial neighbor set");
                break;
            }
        };

        let assoc = association::score_sets(&edits, &basket_set, &params.association);
        if assoc.association < params.min_association {
            continue;
        }

        let items = if edits.total >= params.association.expertise_threshold {
            edits.nonminor
        } else {
            edits.all
        };
        scored.push((
            Neighbor {
                user: candidate,
                association: assoc.association,
                shared: assoc.shared,
                cosine: assoc.cosine,
            },
            items,
        ));
    }

    let neighbors = ScoredNeighbors::accumulate(scored, &basket_set, params);

    // Threshold filter with backoff over the already-scored state
    let mut tau = params.threshold.max(params.min_threshold);
    let mut candidates = neighbors.candidates_at(tau);
    while candidates.len() < count && params.backoff && tau > params.min_threshold {
        tau -= 1;
        candidates = neighbors.candidates_at(tau);
    }

    let satisfied = candidates.len() >= count;
    candidates.truncate(count);

    tracing::info!(
        user = %user,
        neighbors = neighbors.neighbor_count(),
        candidates = candidates.len(),
        final_threshold = tau,
        satisfied = satisfied,
        "Co-edit recommendation completed"
    );

    Ok(CoEditResult {
        candidates,
        final_threshold: tau,
        satisfied,
    })
}
