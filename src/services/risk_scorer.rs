//! Risk scoring.
//!
//! The score is a weighted sum of feature contributions. Factors are
//! evaluated in a fixed order and each one that contributes appends its
//! reason, so identical features always produce identical reasons:
//!
//! 1. pipeline failure
//! 2. outstanding approvals
//! 3. change size
//! 4. staleness
//! 5. work in progress
//! 6. sensitive labels
//! 7. discussion activity

use crate::config::RiskConfig;
use crate::models::{ChangeSizeBucket, MergeRequestFeatures, RiskAssessment, RiskBand};

/// Map a score to its band using the configured cut points.
pub fn band_for(score: f64, config: &RiskConfig) -> RiskBand {
    if score < config.low_below {
        RiskBand::Low
    } else if score < config.medium_below {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Stateless scorer over a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

struct Tally {
    score: f64,
    reasons: Vec<String>,
}

impl Tally {
    fn add(&mut self, contribution: f64, reason: impl FnOnce() -> String) {
        if contribution > 0.0 {
            self.score += contribution;
            self.reasons.push(reason());
        }
    }
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    fn size_weight(&self, bucket: ChangeSizeBucket) -> f64 {
        match bucket {
            ChangeSizeBucket::Unknown | ChangeSizeBucket::S => 0.0,
            ChangeSizeBucket::M => self.config.size_m_weight,
            ChangeSizeBucket::L => self.config.size_l_weight,
            ChangeSizeBucket::XL => self.config.size_xl_weight,
        }
    }

    /// Score one merge request.
    pub fn score(&self, features: &MergeRequestFeatures) -> RiskAssessment {
        let cfg = &self.config;
        let mut tally = Tally {
            score: 0.0,
            reasons: Vec::new(),
        };

        if features.last_pipeline_failed {
            tally.add(cfg.pipeline_failed_weight, || "last pipeline failed".to_string());
        }

        let counted = features.approvals_left.min(cfg.max_counted_approvals);
        tally.add(counted as f64 * cfg.approval_left_weight, || {
            match features.approvals_left {
                1 => "1 approval still required".to_string(),
                n => format!("{} approvals still required", n),
            }
        });

        tally.add(self.size_weight(features.change_size_bucket), || {
            format!("change size {}", features.change_size_bucket)
        });

        if features.age_hours >= cfg.stale_after_hours {
            tally.add(cfg.stale_weight, || {
                format!("open for {:.0} hours", features.age_hours)
            });
        }

        if features.work_in_progress {
            tally.add(cfg.wip_weight, || "marked as work in progress".to_string());
        }

        if features.labels_sensitive {
            tally.add(cfg.sensitive_labels_weight, || "carries a sensitive label".to_string());
        }

        if features.notes_count_24h >= cfg.busy_notes_threshold {
            tally.add(cfg.busy_discussion_weight, || {
                format!("{} notes in the last 24 hours", features.notes_count_24h)
            });
        }

        let band = band_for(tally.score, cfg);
        log::debug!(
            "[risk] MR {} scored {:.2} ({}), {} factors",
            features.mr_id,
            tally.score,
            band,
            tally.reasons.len()
        );

        RiskAssessment {
            mr_id: features.mr_id,
            score: tally.score,
            band,
            reasons: tally.reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> MergeRequestFeatures {
        MergeRequestFeatures::neutral(1, 10)
    }

    #[test]
    fn test_neutral_features_score_zero() {
        let assessment = RiskScorer::default().score(&features());
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.band, RiskBand::Low);
        assert!(assessment.reasons.is_empty());
    }

    #[test]
    fn test_band_thresholds() {
        let config = RiskConfig::default();
        assert_eq!(band_for(0.0, &config), RiskBand::Low);
        assert_eq!(band_for(1.99, &config), RiskBand::Low);
        assert_eq!(band_for(2.0, &config), RiskBand::Medium);
        assert_eq!(band_for(3.99, &config), RiskBand::Medium);
        assert_eq!(band_for(4.0, &config), RiskBand::High);
    }

    #[test]
    fn test_stale_failed_wip_is_high() {
        let mut f = features();
        f.age_hours = 200.0;
        f.last_pipeline_failed = true;
        f.work_in_progress = true;

        let assessment = RiskScorer::default().score(&f);
        assert_eq!(assessment.score, 6.0);
        assert_eq!(assessment.band, RiskBand::High);
        assert_eq!(
            assessment.reasons,
            vec![
                "last pipeline failed",
                "open for 200 hours",
                "marked as work in progress",
            ]
        );
    }

    #[test]
    fn test_reasons_follow_fixed_order() {
        let f = MergeRequestFeatures {
            mr_id: 5,
            project_id: 10,
            age_hours: 100.0,
            change_size_bucket: ChangeSizeBucket::XL,
            last_pipeline_failed: true,
            approvals_left: 1,
            work_in_progress: true,
            labels_sensitive: true,
            notes_count_24h: 12,
        };

        let assessment = RiskScorer::default().score(&f);
        assert_eq!(
            assessment.reasons,
            vec![
                "last pipeline failed",
                "1 approval still required",
                "change size XL",
                "open for 100 hours",
                "marked as work in progress",
                "carries a sensitive label",
                "12 notes in the last 24 hours",
            ]
        );
        assert_eq!(assessment.score, 3.0 + 0.5 + 2.5 + 2.0 + 1.0 + 1.5 + 0.5);
    }

    #[test]
    fn test_approvals_are_capped() {
        let mut f = features();
        f.approvals_left = 9;

        let assessment = RiskScorer::default().score(&f);
        assert_eq!(assessment.score, 2.0);
        assert_eq!(assessment.reasons, vec!["9 approvals still required"]);
    }

    #[test]
    fn test_pipeline_failure_never_lowers_score() {
        let scorer = RiskScorer::default();
        let sizes = [
            ChangeSizeBucket::Unknown,
            ChangeSizeBucket::S,
            ChangeSizeBucket::M,
            ChangeSizeBucket::L,
            ChangeSizeBucket::XL,
        ];

        for size in sizes {
            for wip in [false, true] {
                let mut f = features();
                f.change_size_bucket = size;
                f.work_in_progress = wip;
                f.age_hours = 80.0;

                let passing = scorer.score(&f);
                f.last_pipeline_failed = true;
                let failing = scorer.score(&f);
                assert!(failing.score >= passing.score);
                assert!(failing.band >= passing.band);
            }
        }
    }

    #[test]
    fn test_zero_weight_factor_adds_no_reason() {
        let config = RiskConfig {
            wip_weight: 0.0,
            ..RiskConfig::default()
        };
        let mut f = features();
        f.work_in_progress = true;

        let assessment = RiskScorer::new(config).score(&f);
        assert_eq!(assessment.score, 0.0);
        assert!(assessment.reasons.is_empty());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let mut f = features();
        f.change_size_bucket = ChangeSizeBucket::L;
        f.labels_sensitive = true;

        let scorer = RiskScorer::default();
        assert_eq!(scorer.score(&f), scorer.score(&f));
    }

    #[test]
    fn test_custom_thresholds() {
        let config = RiskConfig {
            low_below: 1.0,
            medium_below: 1.2,
            ..RiskConfig::default()
        };
        let mut f = features();
        f.change_size_bucket = ChangeSizeBucket::L;

        let assessment = RiskScorer::new(config).score(&f);
        assert_eq!(assessment.band, RiskBand::High);
    }
}
