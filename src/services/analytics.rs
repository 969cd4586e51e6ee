//! Analytics service: the operations exposed to the API layer.
//!
//! Owns the store handle, the scoring configuration and the summary cache.
//! Create one at startup and share it (behind an `Arc` if needed); there is
//! no global state.

use crate::config::{AnalyticsConfig, ReviewerConfig};
use crate::db::pool::DbPool;
use crate::db::{interactions, merge_requests, reviewer_edges};
use crate::error::AppError;
use crate::models::{Interaction, RankedReviewer, RiskAssessment};
use crate::services::aggregator::{self, Aggregation, LookbackWindow};
use crate::services::artifact_cache::{ArtifactCache, CacheKey};
use crate::services::edge_weight;
use crate::services::ranker;
use crate::services::risk_features;
use crate::services::risk_scorer::RiskScorer;
use crate::services::summarizer::{Summarizer, Summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a reviewer graph rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    /// Edges written to the store.
    pub edges: usize,
    /// Pairs dropped because their weight was not positive.
    pub pairs_dropped: usize,
    /// Malformed interaction rows skipped.
    pub skipped_rows: usize,
    /// Self-interactions ignored.
    pub self_interactions: usize,
    pub computed_at: DateTime<Utc>,
}

/// Live suggestions for one author plus what the read had to skip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionReport {
    pub author_id: i64,
    pub reviewers: Vec<RankedReviewer>,
    /// Malformed rows of this author's history that were skipped.
    ///
    /// Rows without an author cannot be attributed to anyone and only show
    /// up in `AggregationReport::skipped_rows`.
    pub skipped_rows: usize,
    /// Self-interactions ignored.
    pub self_interactions: usize,
}

fn validate_id(id: i64, field: &str) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::invalid_input_field(
            format!("{} must be a positive ID, got {}", field, id),
            field,
        ));
    }
    Ok(())
}

/// Rank reviewers for one author straight from in-memory interactions.
///
/// # Arguments
/// * `interactions` - Interaction history (any authors; others are ignored)
/// * `author_id` - Author to suggest reviewers for
/// * `now` - Reference time for the lookback window and recency
/// * `config` - Lookback and cap settings
pub fn suggest_reviewers_from(
    interactions: &[Interaction],
    author_id: i64,
    now: DateTime<Utc>,
    config: &ReviewerConfig,
) -> Result<Vec<RankedReviewer>, AppError> {
    validate_id(author_id, "author_id")?;

    let window = LookbackWindow::ending_at(now, config.lookback_days);
    let aggregation = aggregator::aggregate(
        interactions.iter().filter(|i| i.author_id == author_id),
        &window,
    );

    Ok(rank_for_author(&aggregation, author_id, now, config))
}

fn rank_for_author(
    aggregation: &Aggregation,
    author_id: i64,
    now: DateTime<Utc>,
    config: &ReviewerConfig,
) -> Vec<RankedReviewer> {
    let edges = edge_weight::compute_edges(aggregation, now).edges;
    ranker::top_n(ranker::rank_reviewers(author_id, &edges), config.max_suggestions)
}

/// Entry point for reviewer suggestions, risk assessments and cached summaries.
pub struct AnalyticsService {
    pool: DbPool,
    config: AnalyticsConfig,
    scorer: RiskScorer,
    summaries: ArtifactCache<Summary>,
    summarizer: Arc<dyn Summarizer>,
}

impl AnalyticsService {
    /// Create the service. Fails if the configuration is inconsistent.
    pub fn new(
        pool: DbPool,
        config: AnalyticsConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, AppError> {
        config.validate()?;

        Ok(Self {
            pool,
            scorer: RiskScorer::new(config.risk.clone()),
            summaries: ArtifactCache::from_config(&config.cache),
            config,
            summarizer,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The summary cache, for maintenance (stats, purging, forced refresh).
    pub fn summary_cache(&self) -> &ArtifactCache<Summary> {
        &self.summaries
    }

    // ---- Reviewer suggestions ----

    /// Suggested reviewers for an author, computed from the interaction table now.
    pub async fn get_reviewer_suggestions(
        &self,
        author_id: i64,
    ) -> Result<Vec<RankedReviewer>, AppError> {
        self.get_reviewer_suggestions_at(author_id, Utc::now()).await
    }

    /// Suggested reviewers for an author with a pinned reference time.
    ///
    /// An author without history gets an empty list.
    pub async fn get_reviewer_suggestions_at(
        &self,
        author_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedReviewer>, AppError> {
        Ok(self.get_reviewer_suggestion_report_at(author_id, now).await?.reviewers)
    }

    /// Suggested reviewers plus the counts of rows skipped while reading the
    /// author's history.
    pub async fn get_reviewer_suggestion_report_at(
        &self,
        author_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SuggestionReport, AppError> {
        validate_id(author_id, "author_id")?;

        let window = LookbackWindow::ending_at(now, self.config.reviewers.lookback_days);
        let rows = interactions::load_interactions_for_author(&self.pool, author_id, window.start)
            .await?;
        let aggregation = aggregator::aggregate_rows(rows, &window);

        if aggregation.skipped_rows > 0 {
            log::debug!(
                "[graph] Author {}: {} malformed rows skipped",
                author_id,
                aggregation.skipped_rows
            );
        }

        Ok(SuggestionReport {
            author_id,
            reviewers: rank_for_author(&aggregation, author_id, now, &self.config.reviewers),
            skipped_rows: aggregation.skipped_rows,
            self_interactions: aggregation.self_interactions,
        })
    }

    /// Suggested reviewers read from the last materialized graph.
    pub async fn get_stored_reviewer_suggestions(
        &self,
        author_id: i64,
    ) -> Result<Vec<RankedReviewer>, AppError> {
        validate_id(author_id, "author_id")?;

        let edges = reviewer_edges::get_edges_for_author(&self.pool, author_id).await?;
        Ok(ranker::top_n(
            ranker::rank_reviewers(author_id, &edges),
            self.config.reviewers.max_suggestions,
        ))
    }

    /// Recompute the whole reviewer graph and replace the stored edges.
    pub async fn rebuild_reviewer_graph(
        &self,
        now: DateTime<Utc>,
    ) -> Result<AggregationReport, AppError> {
        let window = LookbackWindow::ending_at(now, self.config.reviewers.lookback_days);
        let rows = interactions::load_interactions_since(&self.pool, window.start).await?;
        let row_count = rows.len();

        let aggregation = aggregator::aggregate_rows(rows, &window);
        let edge_set = edge_weight::compute_edges(&aggregation, now);
        let written = reviewer_edges::replace_edges(&self.pool, &edge_set.edges, now).await?;

        log::info!(
            "[graph] Rebuilt reviewer graph from {} rows: {} edges, {} skipped rows",
            row_count,
            written,
            aggregation.skipped_rows
        );

        Ok(AggregationReport {
            edges: edge_set.edges.len(),
            pairs_dropped: edge_set.dropped,
            skipped_rows: aggregation.skipped_rows,
            self_interactions: aggregation.self_interactions,
            computed_at: now,
        })
    }

    // ---- Risk ----

    /// Risk assessment for a merge request as of now.
    pub async fn get_risk_assessment(&self, mr_id: i64) -> Result<RiskAssessment, AppError> {
        self.get_risk_assessment_at(mr_id, Utc::now()).await
    }

    /// Risk assessment for a merge request with a pinned reference time.
    pub async fn get_risk_assessment_at(
        &self,
        mr_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RiskAssessment, AppError> {
        validate_id(mr_id, "mr_id")?;

        let raw = merge_requests::get_merge_request(&self.pool, mr_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("MergeRequest", mr_id.to_string()))?;

        let features = risk_features::extract_features(&raw, now)?;
        Ok(self.scorer.score(&features))
    }

    /// Score every open merge request of a project, riskiest first.
    ///
    /// Rows that fail structural validation are skipped and logged.
    pub async fn get_project_risk_assessments(
        &self,
        project_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RiskAssessment>, AppError> {
        validate_id(project_id, "project_id")?;

        let rows = merge_requests::list_open_merge_requests(&self.pool, project_id).await?;
        let mut assessments: Vec<RiskAssessment> = rows
            .iter()
            .filter_map(|raw| match risk_features::extract_features(raw, now) {
                Ok(features) => Some(self.scorer.score(&features)),
                Err(e) => {
                    log::warn!("[risk] Skipping MR in project {}: {}", project_id, e);
                    None
                }
            })
            .collect();

        assessments.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.mr_id.cmp(&b.mr_id))
        });

        Ok(assessments)
    }

    // ---- Summaries ----

    /// Summary for a merge request revision, generated once and then cached.
    pub async fn get_cached_summary(
        &self,
        mr_id: i64,
        content_revision: &str,
    ) -> Result<Arc<Summary>, AppError> {
        let key = CacheKey::new(mr_id, content_revision)?;
        let summarizer = Arc::clone(&self.summarizer);
        let revision = key.content_revision.clone();

        let summary = self
            .summaries
            .compute_and_store(key, move || async move {
                summarizer.summarize(mr_id, &revision).await
            })
            .await?;

        Ok(summary)
    }

    /// Drop a cached summary so the next request regenerates it.
    pub fn invalidate_summary(&self, mr_id: i64, content_revision: &str) -> Result<bool, AppError> {
        let key = CacheKey::new(mr_id, content_revision)?;
        Ok(self.summaries.invalidate(&key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionKind;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn interaction(author: i64, reviewer: i64, kind: InteractionKind, days_ago: i64) -> Interaction {
        Interaction {
            author_id: author,
            reviewer_id: reviewer,
            merge_request_id: 100,
            kind,
            occurred_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_recent_approver_outranks_old_commenter() {
        // B (2) approved three times in the last 10 days; C (3) commented once 100 days ago.
        let history = vec![
            interaction(1, 2, InteractionKind::Approval, 2),
            interaction(1, 2, InteractionKind::Approval, 5),
            interaction(1, 2, InteractionKind::Approval, 9),
            interaction(1, 3, InteractionKind::Comment, 100),
        ];
        let config = ReviewerConfig {
            lookback_days: 365,
            max_suggestions: None,
        };

        let ranked = suggest_reviewers_from(&history, 1, now(), &config).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].reviewer_id, ranked[0].rank), (2, 1));
        assert_eq!((ranked[1].reviewer_id, ranked[1].rank), (3, 2));
        assert!((ranked[0].weight - 9.0 * 1.2 * 1.1).abs() < 1e-9);
        assert!((ranked[1].weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_lookback_excludes_old_history() {
        let history = vec![interaction(1, 3, InteractionKind::Comment, 100)];
        let ranked =
            suggest_reviewers_from(&history, 1, now(), &ReviewerConfig::default()).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_other_authors_ignored_and_cap_applied() {
        let history = vec![
            interaction(1, 2, InteractionKind::Review, 1),
            interaction(1, 3, InteractionKind::Comment, 1),
            interaction(1, 4, InteractionKind::Approval, 1),
            interaction(9, 5, InteractionKind::Approval, 1),
        ];
        let config = ReviewerConfig {
            lookback_days: 90,
            max_suggestions: Some(2),
        };

        let ranked = suggest_reviewers_from(&history, 1, now(), &config).unwrap();
        let reviewers: Vec<i64> = ranked.iter().map(|r| r.reviewer_id).collect();
        assert_eq!(reviewers, vec![4, 2]);
    }

    #[test]
    fn test_invalid_author_rejected() {
        let err = suggest_reviewers_from(&[], 0, now(), &ReviewerConfig::default()).unwrap_err();
        assert!(err.is_invalid_input());
    }
}
