//! Merge request models: the raw upstream row and the derived risk features.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Change size bucket derived from churn (additions + deletions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeSizeBucket {
    /// Neither additions nor deletions were reported.
    #[serde(rename = "unknown")]
    Unknown,
    S,
    M,
    L,
    XL,
}

impl ChangeSizeBucket {
    /// Bucket a churn value: S ≤ 50, M ≤ 200, L ≤ 500, XL above.
    pub fn from_churn(churn: i64) -> Self {
        match churn {
            i64::MIN..=50 => Self::S,
            51..=200 => Self::M,
            201..=500 => Self::L,
            _ => Self::XL,
        }
    }
}

impl std::fmt::Display for ChangeSizeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::S => write!(f, "S"),
            Self::M => write!(f, "M"),
            Self::L => write!(f, "L"),
            Self::XL => write!(f, "XL"),
        }
    }
}

/// A row of the `merge_requests` table.
///
/// Note: `labels` is stored as a JSON string in SQLite but deserialized to
/// Vec<String> for use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct RawMergeRequest {
    /// GitLab MR ID (global).
    pub mr_id: Option<i64>,

    /// GitLab project ID.
    pub project_id: Option<i64>,

    /// MR title.
    pub title: Option<String>,

    /// MR creation timestamp (Unix).
    pub created_at: Option<i64>,

    /// Lines added.
    pub additions: Option<i64>,

    /// Lines deleted.
    pub deletions: Option<i64>,

    /// Status of the most recent pipeline (`success`, `failed`, ...).
    pub last_pipeline_status: Option<String>,

    /// Approvals still required before merge.
    pub approvals_left: Option<i64>,

    /// JSON array of labels.
    pub labels: Option<String>,

    /// Notes posted in the last 24 hours.
    pub notes_count_24h: Option<i64>,
}

impl RawMergeRequest {
    /// Parse labels from JSON string.
    pub fn labels_vec(&self) -> Vec<String> {
        self.labels
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Whether the most recent pipeline failed.
    pub fn pipeline_failed(&self) -> bool {
        self.last_pipeline_status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("failed"))
    }
}

/// Normalized risk inputs for one merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequestFeatures {
    pub mr_id: i64,
    pub project_id: i64,
    /// Hours since creation; 0 when the creation time is unknown.
    pub age_hours: f64,
    pub change_size_bucket: ChangeSizeBucket,
    pub last_pipeline_failed: bool,
    pub approvals_left: u32,
    pub work_in_progress: bool,
    pub labels_sensitive: bool,
    pub notes_count_24h: u32,
}

impl MergeRequestFeatures {
    /// Neutral features for an MR: nothing fires.
    pub fn neutral(mr_id: i64, project_id: i64) -> Self {
        Self {
            mr_id,
            project_id,
            age_hours: 0.0,
            change_size_bucket: ChangeSizeBucket::Unknown,
            last_pipeline_failed: false,
            approvals_left: 0,
            work_in_progress: false,
            labels_sensitive: false,
            notes_count_24h: 0,
        }
    }
}
