//! Reviewer ranking.

use crate::models::{Edge, RankedReviewer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Order by weight descending, then reviewer ID ascending.
fn by_weight_then_reviewer(a: &Edge, b: &Edge) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.reviewer_id.cmp(&b.reviewer_id))
}

/// Rank one author's candidate reviewers.
///
/// Edges belonging to other authors are ignored. An author without history
/// gets an empty list.
pub fn rank_reviewers(author_id: i64, edges: &[Edge]) -> Vec<RankedReviewer> {
    let mut candidates: Vec<&Edge> = edges
        .iter()
        .filter(|e| e.author_id == author_id && e.reviewer_id != author_id)
        .collect();

    candidates.sort_by(|a, b| by_weight_then_reviewer(a, b));

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, e)| RankedReviewer {
            author_id,
            reviewer_id: e.reviewer_id,
            weight: e.weight,
            rank: i as u32 + 1,
        })
        .collect()
}

/// Rank every author present in `edges`, keyed by author ID.
pub fn rank_all(edges: &[Edge]) -> BTreeMap<i64, Vec<RankedReviewer>> {
    let mut by_author: BTreeMap<i64, Vec<Edge>> = BTreeMap::new();
    for edge in edges {
        by_author.entry(edge.author_id).or_default().push(edge.clone());
    }

    by_author
        .into_iter()
        .map(|(author_id, author_edges)| (author_id, rank_reviewers(author_id, &author_edges)))
        .collect()
}

/// Keep the first `limit` entries; ranks stay contiguous.
pub fn top_n(mut ranked: Vec<RankedReviewer>, limit: Option<usize>) -> Vec<RankedReviewer> {
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn edge(author_id: i64, reviewer_id: i64, weight: f64) -> Edge {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Edge {
            author_id,
            reviewer_id,
            interaction_count: 1,
            approval_count: 0,
            review_count: 0,
            comment_count: 1,
            first_interaction_at: at,
            last_interaction_at: at,
            weight,
        }
    }

    #[test]
    fn test_orders_by_weight_desc() {
        let edges = vec![edge(1, 2, 1.0), edge(1, 3, 5.0), edge(1, 4, 2.5)];
        let ranked = rank_reviewers(1, &edges);

        let order: Vec<(i64, u32)> = ranked.iter().map(|r| (r.reviewer_id, r.rank)).collect();
        assert_eq!(order, vec![(3, 1), (4, 2), (2, 3)]);
    }

    #[test]
    fn test_ties_broken_by_reviewer_id() {
        let edges = vec![edge(1, 9, 2.0), edge(1, 4, 2.0), edge(1, 7, 2.0), edge(1, 8, 3.0)];
        let ranked = rank_reviewers(1, &edges);

        let order: Vec<i64> = ranked.iter().map(|r| r.reviewer_id).collect();
        assert_eq!(order, vec![8, 4, 7, 9]);

        for pair in ranked.windows(2) {
            if pair[0].weight == pair[1].weight {
                assert!(pair[0].reviewer_id < pair[1].reviewer_id);
            }
            assert_eq!(pair[1].rank, pair[0].rank + 1);
        }
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut edges = vec![edge(1, 2, 1.0), edge(1, 3, 1.0), edge(1, 4, 4.0)];
        let first = rank_reviewers(1, &edges);
        edges.reverse();
        assert_eq!(rank_reviewers(1, &edges), first);
    }

    #[test]
    fn test_no_history_is_empty() {
        assert!(rank_reviewers(1, &[]).is_empty());
        assert!(rank_reviewers(5, &[edge(1, 2, 1.0)]).is_empty());
    }

    #[test]
    fn test_rank_all_groups_by_author() {
        let edges = vec![edge(2, 1, 1.0), edge(1, 3, 1.0), edge(1, 2, 2.0)];
        let all = rank_all(&edges);

        assert_eq!(all.len(), 2);
        assert_eq!(all[&1][0].reviewer_id, 2);
        assert_eq!(all[&2][0].reviewer_id, 1);
    }

    #[test]
    fn test_top_n() {
        let ranked = rank_reviewers(1, &[edge(1, 2, 3.0), edge(1, 3, 2.0), edge(1, 4, 1.0)]);
        let top = top_n(ranked.clone(), Some(2));
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top_n(ranked, None).len(), 3);
    }
}
