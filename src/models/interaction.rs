//! Interaction model: one reviewer touching one author's merge request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of reviewer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Approval,
    Review,
    Comment,
    /// Any kind the upstream table emits that we do not weight separately.
    Other,
}

impl From<&str> for InteractionKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "approval" | "approved" => Self::Approval,
            "review" | "reviewed" => Self::Review,
            "comment" | "note" => Self::Comment,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approval => write!(f, "approval"),
            Self::Review => write!(f, "review"),
            Self::Comment => write!(f, "comment"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A row of the `interactions` table as ingested upstream.
///
/// Every column is nullable: the table is materialized by an external
/// pipeline and malformed rows are expected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct RawInteraction {
    /// MR author's user ID.
    pub author_id: Option<i64>,

    /// Interacting user's ID.
    pub reviewer_id: Option<i64>,

    /// MR the interaction happened on.
    pub merge_request_id: Option<i64>,

    /// `approval`, `review`, `comment`, or anything else.
    pub kind: Option<String>,

    /// When the interaction happened (Unix).
    pub occurred_at: Option<i64>,
}

impl RawInteraction {
    /// Validate the row, returning `None` when a required column is missing
    /// or an identifier is not a positive integer.
    pub fn into_interaction(self) -> Option<Interaction> {
        let author_id = self.author_id.filter(|id| *id > 0)?;
        let reviewer_id = self.reviewer_id.filter(|id| *id > 0)?;
        let merge_request_id = self.merge_request_id.filter(|id| *id > 0)?;
        let kind = self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let occurred_at = super::from_unix(self.occurred_at?)?;

        Some(Interaction {
            author_id,
            reviewer_id,
            merge_request_id,
            kind: InteractionKind::from(kind),
            occurred_at,
        })
    }
}

/// A validated, immutable interaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub author_id: i64,
    pub reviewer_id: i64,
    pub merge_request_id: i64,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

impl Interaction {
    /// Whether the author interacted with their own MR.
    pub fn is_self_interaction(&self) -> bool {
        self.author_id == self.reviewer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: Option<&str>) -> RawInteraction {
        RawInteraction {
            author_id: Some(1),
            reviewer_id: Some(2),
            merge_request_id: Some(10),
            kind: kind.map(String::from),
            occurred_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(InteractionKind::from("approval"), InteractionKind::Approval);
        assert_eq!(InteractionKind::from("REVIEW"), InteractionKind::Review);
        assert_eq!(InteractionKind::from(" Comment "), InteractionKind::Comment);
        assert_eq!(InteractionKind::from("award_emoji"), InteractionKind::Other);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(InteractionKind::Approval.to_string(), "approval");
        assert_eq!(InteractionKind::Other.to_string(), "other");
    }

    #[test]
    fn test_valid_row_converts() {
        let interaction = raw(Some("approval")).into_interaction().unwrap();
        assert_eq!(interaction.author_id, 1);
        assert_eq!(interaction.reviewer_id, 2);
        assert_eq!(interaction.kind, InteractionKind::Approval);
        assert_eq!(interaction.occurred_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_malformed_rows_rejected() {
        assert!(raw(None).into_interaction().is_none());
        assert!(raw(Some("  ")).into_interaction().is_none());

        let mut missing_author = raw(Some("comment"));
        missing_author.author_id = None;
        assert!(missing_author.into_interaction().is_none());

        let mut zero_reviewer = raw(Some("comment"));
        zero_reviewer.reviewer_id = Some(0);
        assert!(zero_reviewer.into_interaction().is_none());

        let mut no_time = raw(Some("comment"));
        no_time.occurred_at = None;
        assert!(no_time.into_interaction().is_none());
    }

    #[test]
    fn test_unknown_kind_is_kept_as_other() {
        let interaction = raw(Some("emoji")).into_interaction().unwrap();
        assert_eq!(interaction.kind, InteractionKind::Other);
    }
}
