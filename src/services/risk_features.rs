//! Risk feature extraction.
//!
//! Turns a raw merge request row into normalized features. Only a missing
//! `mr_id` or `project_id` is an error; every other missing attribute falls
//! back to a neutral value (0, false, or `ChangeSizeBucket::Unknown`).

use crate::error::AppError;
use crate::models::{from_unix, ChangeSizeBucket, MergeRequestFeatures, RawMergeRequest};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Labels (or label scopes) that mark an MR as sensitive.
pub const SENSITIVE_LABELS: [&str; 3] = ["security", "confidential", "sensitive"];

/// Title prefix markers such as `WIP:`, `[WIP]`, `Draft:`, `(draft)`, plus a
/// `[WIP]` tag anywhere in the title.
fn wip_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^\s*(?:\[(?:wip|draft)\]|\((?:wip|draft)\)|(?:wip|draft)\b)|\[wip\]")
                .map_err(|e| log::error!("[risk] Invalid WIP pattern: {}", e))
                .ok()
        })
        .as_ref()
}

/// Whether a title carries a work-in-progress marker.
pub fn is_work_in_progress(title: &str) -> bool {
    wip_pattern().is_some_and(|pattern| pattern.is_match(title))
}

/// Whether any label is sensitive.
///
/// Scoped labels (`security::high`) match on their scope.
pub fn has_sensitive_label(labels: &[String]) -> bool {
    labels.iter().any(|label| {
        let scope = label.split("::").next().unwrap_or(label).trim();
        SENSITIVE_LABELS
            .iter()
            .any(|sensitive| scope.eq_ignore_ascii_case(sensitive))
    })
}

/// Bucket additions + deletions; `Unknown` when neither is reported.
pub fn change_size(additions: Option<i64>, deletions: Option<i64>) -> ChangeSizeBucket {
    match (additions, deletions) {
        (None, None) => ChangeSizeBucket::Unknown,
        (a, d) => {
            let churn = a.unwrap_or(0).max(0).saturating_add(d.unwrap_or(0).max(0));
            ChangeSizeBucket::from_churn(churn)
        }
    }
}

/// Hours between creation and `now`; 0 for unknown or future creation times.
pub fn age_hours(created_at: Option<i64>, now: DateTime<Utc>) -> f64 {
    created_at
        .and_then(from_unix)
        .map(|created| ((now - created).num_seconds() as f64 / 3600.0).max(0.0))
        .unwrap_or(0.0)
}

fn non_negative(value: Option<i64>) -> u32 {
    value
        .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Derive risk features from a raw merge request.
///
/// # Arguments
/// * `raw` - The merge request row
/// * `now` - Reference time for age computation
pub fn extract_features(
    raw: &RawMergeRequest,
    now: DateTime<Utc>,
) -> Result<MergeRequestFeatures, AppError> {
    let mr_id = raw
        .mr_id
        .ok_or_else(|| AppError::invalid_input_field("merge request ID is required", "mr_id"))?;
    let project_id = raw.project_id.ok_or_else(|| {
        AppError::invalid_input_field(
            format!("project ID is required for merge request {}", mr_id),
            "project_id",
        )
    })?;

    Ok(MergeRequestFeatures {
        mr_id,
        project_id,
        age_hours: age_hours(raw.created_at, now),
        change_size_bucket: change_size(raw.additions, raw.deletions),
        last_pipeline_failed: raw.pipeline_failed(),
        approvals_left: non_negative(raw.approvals_left),
        work_in_progress: raw.title.as_deref().is_some_and(is_work_in_progress),
        labels_sensitive: has_sensitive_label(&raw.labels_vec()),
        notes_count_24h: non_negative(raw.notes_count_24h),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_wip_markers() {
        assert!(is_work_in_progress("WIP: refactor parser"));
        assert!(is_work_in_progress("wip refactor parser"));
        assert!(is_work_in_progress("[WIP] refactor parser"));
        assert!(is_work_in_progress("  (wip) refactor"));
        assert!(is_work_in_progress("Draft: new endpoint"));
        assert!(is_work_in_progress("Refactor parser [WIP]"));

        assert!(!is_work_in_progress("Wipe stale caches"));
        assert!(!is_work_in_progress("Add swipe gesture"));
        assert!(!is_work_in_progress("Fix drafting table layout"));
        assert!(!is_work_in_progress(""));
    }

    #[test]
    fn test_sensitive_labels() {
        let labels = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(has_sensitive_label(&labels(&["backend", "Security"])));
        assert!(has_sensitive_label(&labels(&["CONFIDENTIAL"])));
        assert!(has_sensitive_label(&labels(&["security::high"])));
        assert!(!has_sensitive_label(&labels(&["securityfix", "frontend"])));
        assert!(!has_sensitive_label(&[]));
    }

    #[test]
    fn test_change_size() {
        assert_eq!(change_size(None, None), ChangeSizeBucket::Unknown);
        assert_eq!(change_size(Some(30), Some(20)), ChangeSizeBucket::S);
        assert_eq!(change_size(Some(30), Some(21)), ChangeSizeBucket::M);
        assert_eq!(change_size(Some(300), None), ChangeSizeBucket::L);
        assert_eq!(change_size(None, Some(900)), ChangeSizeBucket::XL);
        assert_eq!(change_size(Some(-10), Some(5)), ChangeSizeBucket::S);
    }

    #[test]
    fn test_age_hours() {
        let created = (now() - Duration::hours(200)).timestamp();
        assert_eq!(age_hours(Some(created), now()), 200.0);
        assert_eq!(age_hours(None, now()), 0.0);

        let future = (now() + Duration::hours(3)).timestamp();
        assert_eq!(age_hours(Some(future), now()), 0.0);
    }

    #[test]
    fn test_extract_full_row() {
        let raw = RawMergeRequest {
            mr_id: Some(11),
            project_id: Some(3),
            title: Some("WIP: rotate keys".to_string()),
            created_at: Some((now() - Duration::hours(48)).timestamp()),
            additions: Some(120),
            deletions: Some(10),
            last_pipeline_status: Some("failed".to_string()),
            approvals_left: Some(2),
            labels: Some(r#"["security"]"#.to_string()),
            notes_count_24h: Some(4),
        };

        let features = extract_features(&raw, now()).unwrap();
        assert_eq!(features.mr_id, 11);
        assert_eq!(features.project_id, 3);
        assert_eq!(features.age_hours, 48.0);
        assert_eq!(features.change_size_bucket, ChangeSizeBucket::M);
        assert!(features.last_pipeline_failed);
        assert_eq!(features.approvals_left, 2);
        assert!(features.work_in_progress);
        assert!(features.labels_sensitive);
        assert_eq!(features.notes_count_24h, 4);
    }

    #[test]
    fn test_missing_optional_fields_are_neutral() {
        let raw = RawMergeRequest {
            mr_id: Some(11),
            project_id: Some(3),
            approvals_left: Some(-1),
            ..Default::default()
        };

        let features = extract_features(&raw, now()).unwrap();
        assert_eq!(features, MergeRequestFeatures::neutral(11, 3));
    }

    #[test]
    fn test_missing_ids_are_validation_errors() {
        let err = extract_features(&RawMergeRequest::default(), now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidInput { field: Some(ref f), .. } if f == "mr_id"
        ));

        let raw = RawMergeRequest {
            mr_id: Some(1),
            ..Default::default()
        };
        let err = extract_features(&raw, now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidInput { field: Some(ref f), .. } if f == "project_id"
        ));
    }
}
