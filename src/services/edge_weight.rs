//! Edge weight calculation.
//!
//! ```text
//! weight = (approvals*3 + reviews*2 + comments*1) * recency * frequency
//! ```
//!
//! Recency is measured against a caller-supplied `now` so results are
//! reproducible.

use crate::models::{Edge, PairCounters};
use crate::services::aggregator::Aggregation;
use chrono::{DateTime, Utc};

pub const APPROVAL_WEIGHT: f64 = 3.0;
pub const REVIEW_WEIGHT: f64 = 2.0;
pub const COMMENT_WEIGHT: f64 = 1.0;

/// Category-weighted interaction score.
pub fn weighted_score(counters: &PairCounters) -> f64 {
    counters.approval_count as f64 * APPROVAL_WEIGHT
        + counters.review_count as f64 * REVIEW_WEIGHT
        + counters.comment_count as f64 * COMMENT_WEIGHT
}

/// Fractional days between `last` and `now`; never negative.
pub fn days_since(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - last).num_seconds() as f64 / 86_400.0).max(0.0)
}

/// 1.2 within 30 days, 1.1 within 90, otherwise 1.0.
pub fn recency_multiplier(days: f64) -> f64 {
    if days <= 30.0 {
        1.2
    } else if days <= 90.0 {
        1.1
    } else {
        1.0
    }
}

/// 1.3 from 10 interactions, 1.2 from 5, 1.1 from 3, otherwise 1.0.
pub fn frequency_multiplier(interaction_count: u32) -> f64 {
    match interaction_count {
        10.. => 1.3,
        5..=9 => 1.2,
        3..=4 => 1.1,
        _ => 1.0,
    }
}

/// Weight of a single pair at `now`.
pub fn edge_weight(counters: &PairCounters, now: DateTime<Utc>) -> f64 {
    weighted_score(counters)
        * recency_multiplier(days_since(counters.last_interaction_at, now))
        * frequency_multiplier(counters.interaction_count)
}

/// Weighted edges for one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    pub edges: Vec<Edge>,
    /// Pairs whose weight came out at or below zero.
    pub dropped: usize,
}

/// Weight every aggregated pair, dropping the ones with no meaningful relationship.
pub fn compute_edges(aggregation: &Aggregation, now: DateTime<Utc>) -> EdgeSet {
    if aggregation.is_empty() {
        return EdgeSet::default();
    }

    let mut set = EdgeSet::default();
    for entry in aggregation.entries() {
        let weight = edge_weight(&entry.counters, now);
        if weight > 0.0 {
            set.edges.push(Edge::from_counters(
                entry.author_id,
                entry.reviewer_id,
                &entry.counters,
                weight,
            ));
        } else {
            set.dropped += 1;
        }
    }

    log::debug!(
        "[graph] Weighted {} edges ({} dropped at zero weight)",
        set.edges.len(),
        set.dropped
    );

    set
}
