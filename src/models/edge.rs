//! Reviewer graph models: per-pair counters, weighted edges, rankings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interaction counters accumulated for one (author, reviewer) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCounters {
    /// All interactions, including kinds without a category counter.
    pub interaction_count: u32,
    pub approval_count: u32,
    pub review_count: u32,
    pub comment_count: u32,
    pub first_interaction_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

impl PairCounters {
    /// Start counters from a single observation time.
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            interaction_count: 0,
            approval_count: 0,
            review_count: 0,
            comment_count: 0,
            first_interaction_at: at,
            last_interaction_at: at,
        }
    }
}

/// A directed, weighted relationship from an author to a candidate reviewer.
///
/// `author_id != reviewer_id` always holds; self-edges are never built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub author_id: i64,
    pub reviewer_id: i64,
    pub interaction_count: u32,
    pub approval_count: u32,
    pub review_count: u32,
    pub comment_count: u32,
    pub first_interaction_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    pub weight: f64,
}

impl Edge {
    /// Attach a weight to a pair's counters.
    pub fn from_counters(author_id: i64, reviewer_id: i64, counters: &PairCounters, weight: f64) -> Self {
        Self {
            author_id,
            reviewer_id,
            interaction_count: counters.interaction_count,
            approval_count: counters.approval_count,
            review_count: counters.review_count,
            comment_count: counters.comment_count,
            first_interaction_at: counters.first_interaction_at,
            last_interaction_at: counters.last_interaction_at,
            weight,
        }
    }
}

/// A suggested reviewer for an author, 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedReviewer {
    pub author_id: i64,
    pub reviewer_id: i64,
    pub weight: f64,
    pub rank: u32,
}
