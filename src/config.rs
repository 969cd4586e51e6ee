//! Analytics configuration.
//!
//! Settings are read from a JSON file. Every field has a default, so a
//! missing file or a partial document is valid.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default lookback window for the reviewer graph.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;

/// Default summary TTL (24 hours).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Default bound on waiting for a summary computation.
pub const DEFAULT_COMPUTE_TIMEOUT_SECS: u64 = 120;

/// Reviewer graph settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerConfig {
    /// Interactions older than this many days are ignored.
    pub lookback_days: i64,

    /// Cap on the number of suggestions returned per author.
    pub max_suggestions: Option<usize>,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_suggestions: None,
        }
    }
}

/// Risk scoring weights and band thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub pipeline_failed_weight: f64,

    /// Added per outstanding approval, up to `max_counted_approvals`.
    pub approval_left_weight: f64,
    pub max_counted_approvals: u32,

    pub size_m_weight: f64,
    pub size_l_weight: f64,
    pub size_xl_weight: f64,

    pub stale_weight: f64,
    pub stale_after_hours: f64,

    pub wip_weight: f64,
    pub sensitive_labels_weight: f64,

    pub busy_discussion_weight: f64,
    pub busy_notes_threshold: u32,

    /// Scores below this are Low (T1).
    pub low_below: f64,

    /// Scores below this are Medium, anything else High (T2).
    pub medium_below: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            pipeline_failed_weight: 3.0,
            approval_left_weight: 0.5,
            max_counted_approvals: 4,
            size_m_weight: 0.5,
            size_l_weight: 1.5,
            size_xl_weight: 2.5,
            stale_weight: 2.0,
            stale_after_hours: 72.0,
            wip_weight: 1.0,
            sensitive_labels_weight: 1.5,
            busy_discussion_weight: 0.5,
            busy_notes_threshold: 10,
            low_below: 2.0,
            medium_below: 4.0,
        }
    }
}

impl RiskConfig {
    fn weights(&self) -> [(&'static str, f64); 9] {
        [
            ("pipeline_failed_weight", self.pipeline_failed_weight),
            ("approval_left_weight", self.approval_left_weight),
            ("size_m_weight", self.size_m_weight),
            ("size_l_weight", self.size_l_weight),
            ("size_xl_weight", self.size_xl_weight),
            ("stale_weight", self.stale_weight),
            ("wip_weight", self.wip_weight),
            ("sensitive_labels_weight", self.sensitive_labels_weight),
            ("busy_discussion_weight", self.busy_discussion_weight),
        ]
    }
}

/// Summary cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a stored summary stays valid.
    pub ttl_secs: u64,

    /// How long a caller waits on an in-flight computation.
    pub compute_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            compute_timeout_secs: DEFAULT_COMPUTE_TIMEOUT_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn compute_timeout(&self) -> Duration {
        Duration::from_secs(self.compute_timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub reviewers: ReviewerConfig,
    pub risk: RiskConfig,
    pub cache: CacheConfig,
}

impl AnalyticsConfig {
    /// Load configuration from a JSON file, using defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::debug!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&raw)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make scoring or ranking meaningless.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.reviewers.lookback_days <= 0 {
            return Err(AppError::config("reviewers.lookback_days must be positive"));
        }

        for (name, value) in self.risk.weights() {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::config(format!(
                    "risk.{} must be a non-negative number",
                    name
                )));
            }
        }

        let (t1, t2) = (self.risk.low_below, self.risk.medium_below);
        if !t1.is_finite() || !t2.is_finite() || t1 >= t2 {
            return Err(AppError::config(
                "risk.low_below must be lower than risk.medium_below",
            ));
        }

        if self.cache.compute_timeout_secs == 0 {
            return Err(AppError::config("cache.compute_timeout_secs must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        AnalyticsConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = AnalyticsConfig::from_json(r#"{"risk": {"medium_below": 5.5}}"#).unwrap();
        assert_eq!(config.risk.medium_below, 5.5);
        assert_eq!(config.risk.low_below, 2.0);
        assert_eq!(config.reviewers.lookback_days, DEFAULT_LOOKBACK_DAYS);
        assert_eq!(config.cache.ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let err = AnalyticsConfig::from_json(r#"{"risk": {"low_below": 4.0, "medium_below": 4.0}}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = AnalyticsConfig::from_json(r#"{"risk": {"wip_weight": -1.0}}"#).unwrap_err();
        assert!(err.to_string().contains("wip_weight"));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = AnalyticsConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("insights.json");
        std::fs::write(
            &path,
            r#"{"reviewers": {"lookback_days": 30, "max_suggestions": 5}, "cache": {"ttl_secs": 60}}"#,
        )
        .unwrap();

        let config = AnalyticsConfig::load(&path).unwrap();
        assert_eq!(config.reviewers.lookback_days, 30);
        assert_eq!(config.reviewers.max_suggestions, Some(5));
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("insights.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            AnalyticsConfig::load(&path),
            Err(AppError::Config { .. })
        ));
    }
}
