use std::collections::HashSet;

use crate::error::AppResult;
use crate::stores::{EditGraph, UserEdits};

/// Parameters for the association computation
#[derive(Debug, Clone)]
pub struct AssociationParams {
    /// Editors with at least this many total edits are scored on their
    /// non-trivial edits only, so prolific minor-edit activity does not
    /// dominate the overlap.
    pub expertise_threshold: i64,
}

impl Default for AssociationParams {
    fn default() -> Self {
        Self {
            expertise_threshold: 500,
        }
    }
}

/// Overlap similarity between a candidate editor's item set and a basket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    /// Jaccard overlap, in [0, 1]
    pub association: f64,
    pub shared: usize,
    pub cosine: f64,
}

impl Association {
    pub const ZERO: Association = Association {
        association: 0.0,
        shared: 0,
        cosine: 0.0,
    };
}

/// Scores a candidate's edit sets against the basket
///
/// Uses the non-trivial edit set once the candidate crosses the expertise
/// threshold, the full set otherwise. Returns zeros when the selected set is
/// empty.
pub fn score_sets(
    edits: &UserEdits,
    basket: &HashSet<String>,
    params: &AssociationParams,
) -> Association {
    let set: &[String] = if edits.total >= params.expertise_threshold {
        &edits.nonminor
    } else {
        &edits.all
    };

    if set.is_empty() || basket.is_empty() {
        return Association::ZERO;
    }

    let shared = set.iter().filter(|title| basket.contains(*title)).count();
    let union = set.len() + basket.len() - shared;

    Association {
        association: shared as f64 / union as f64,
        shared,
        cosine: shared as f64 / ((set.len() * basket.len()) as f64).sqrt(),
    }
}

/// Fetches a candidate editor's edit sets and scores them against the basket
pub async fn score_editor(
    graph: &dyn EditGraph,
    lang: &str,
    candidate: &str,
    basket: &HashSet<String>,
    params: &AssociationParams,
) -> AppResult<Association> {
    let edits = graph.edits_of(lang, candidate).await?;
    Ok(score_sets(&edits, basket, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket(titles: &[&str]) -> HashSet<String> {
        titles.iter().map(|t| t.to_string()).collect()
    }

    fn edits(all: &[&str], nonminor: &[&str], total: i64) -> UserEdits {
        UserEdits {
            all: all.iter().map(|t| t.to_string()).collect(),
            nonminor: nonminor.iter().map(|t| t.to_string()).collect(),
            total,
        }
    }

    #[test]
    fn test_empty_edit_set_scores_zero() {
        let result = score_sets(
            &UserEdits::default(),
            &basket(&["A", "B"]),
            &AssociationParams::default(),
        );
        assert_eq!(result, Association::ZERO);
    }

    #[test]
    fn test_single_shared_item() {
        // |E| = 2, |B| = 2, shared = 1, union = 3
        let result = score_sets(
            &edits(&["A", "X"], &[], 10),
            &basket(&["A", "B"]),
            &AssociationParams::default(),
        );

        assert_eq!(result.shared, 1);
        assert!((result.association - 1.0 / 3.0).abs() < 1e-9);
        assert!((result.cosine - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_identical_sets_score_one() {
        let result = score_sets(
            &edits(&["A", "B"], &[], 10),
            &basket(&["A", "B"]),
            &AssociationParams::default(),
        );

        assert_eq!(result.shared, 2);
        assert!((result.association - 1.0).abs() < 1e-9);
        assert!((result.cosine - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_association_stays_in_unit_interval() {
        let cases = [
            edits(&["A"], &[], 1),
            edits(&["A", "B", "C", "D"], &[], 4),
            edits(&["X", "Y", "Z"], &[], 3),
        ];
        for e in &cases {
            let result = score_sets(e, &basket(&["A", "B"]), &AssociationParams::default());
            assert!(result.association >= 0.0 && result.association <= 1.0);
        }
    }

    #[test]
    fn test_expertise_threshold_switches_to_nonminor_set() {
        let e = edits(&["A", "B", "X", "Y"], &["X", "Y"], 1000);
        let params = AssociationParams {
            expertise_threshold: 500,
        };

        // Above the threshold only the non-trivial set counts, and it shares
        // nothing with the basket.
        let result = score_sets(&e, &basket(&["A", "B"]), &params);
        assert_eq!(result.shared, 0);

        // Below the threshold the full set counts
        let lenient = AssociationParams {
            expertise_threshold: 5000,
        };
        let result = score_sets(&e, &basket(&["A", "B"]), &lenient);
        assert_eq!(result.shared, 2);
    }

    #[test]
    fn test_expert_with_no_nonminor_edits_scores_zero() {
        let e = edits(&["A", "B"], &[], 1000);
        let result = score_sets(&e, &basket(&["A", "B"]), &AssociationParams::default());
        assert_eq!(result, Association::ZERO);
    }

    #[tokio::test]
    async fn test_score_editor_fetches_and_scores() {
        use crate::stores::MockEditGraph;

        let mut graph = MockEditGraph::new();
        graph
            .expect_edits_of()
            .withf(|lang, user| lang == "en" && user == "bob")
            .returning(|_, _| Ok(edits(&["A", "X"], &[], 10)));

        let result = score_editor(
            &graph,
            "en",
            "bob",
            &basket(&["A", "B"]),
            &AssociationParams::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.shared, 1);
        assert!((result.association - 1.0 / 3.0).abs() < 1e-9);
    }
}
