//! Analytics services.
//!
//! The graph and risk components are pure functions over immutable input and
//! can run in parallel across authors or merge requests. The artifact cache
//! is the only component with shared mutable state.
//!
//! `analytics::AnalyticsService` ties them to the SQLite store and exposes
//! the operations callers use.

pub mod aggregator;
pub mod analytics;
pub mod artifact_cache;
pub mod edge_weight;
pub mod ranker;
pub mod risk_features;
pub mod risk_scorer;
pub mod summarizer;

pub use aggregator::{Aggregation, LookbackWindow};
pub use analytics::{AggregationReport, AnalyticsService, SuggestionReport};
pub use artifact_cache::{ArtifactCache, CacheError, CacheKey, CacheStats};
pub use risk_scorer::RiskScorer;
pub use summarizer::{Summarizer, Summary};
