//! MR Insights - reviewer recommendations, merge request risk scoring and
//! cached AI summaries over a local GitLab data store.
//!
//! The interaction and merge request tables are filled by an upstream sync;
//! this crate reads them, ranks reviewers, scores risk and fronts an external
//! summarizer with a content-keyed cache.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::AnalyticsConfig;
pub use error::AppError;
pub use models::{
    ChangeSizeBucket, Edge, Interaction, InteractionKind, MergeRequestFeatures, RankedReviewer,
    RiskAssessment, RiskBand,
};
pub use services::{AnalyticsService, CacheKey, Summarizer, Summary};

use std::path::Path;
use std::sync::Arc;

/// Open the store in `data_dir`, load configuration and build the service.
///
/// A missing `config_path` means default settings.
pub async fn start(
    data_dir: &Path,
    config_path: &Path,
    summarizer: Arc<dyn Summarizer>,
) -> Result<AnalyticsService, AppError> {
    let config = AnalyticsConfig::load(config_path)?;

    let db_path = db::get_db_path(data_dir);
    let pool = db::initialize(&db_path).await?;

    log::info!("[insights] Store ready at {}", db_path.display());

    AnalyticsService::new(pool, config, summarizer)
}
