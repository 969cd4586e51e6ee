//! Data models for the analytics core.
//!
//! Raw row types mirror the upstream tables as they are stored in SQLite
//! (nullable columns, Unix timestamps, JSON-encoded label arrays). Derived
//! types are what the services produce and what callers consume.
//!
//! All output models derive Serialize so the calling layer can forward them
//! as-is.

pub mod edge;
pub mod interaction;
pub mod merge_request;
pub mod risk;

// Re-exports for convenient access
pub use edge::{Edge, PairCounters, RankedReviewer};
pub use interaction::{Interaction, InteractionKind, RawInteraction};
pub use merge_request::{ChangeSizeBucket, MergeRequestFeatures, RawMergeRequest};
pub use risk::{RiskAssessment, RiskBand};

use chrono::{DateTime, Utc};

/// Convert a Unix timestamp (seconds) into a UTC datetime.
pub(crate) fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
