//! Summarizer seam.
//!
//! Generating a summary (prompting a language model, calling a hosted API)
//! happens outside this crate. The analytics service only needs something
//! that turns a merge request revision into an artifact, and only calls it
//! on a cache miss.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AI-generated summary of one merge request revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mr_id: i64,
    pub content_revision: String,
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

/// Produces summaries on demand.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, mr_id: i64, content_revision: &str) -> Result<Summary, AppError>;
}
