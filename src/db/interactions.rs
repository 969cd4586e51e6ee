//! Readers for the upstream `interactions` table.
//!
//! Rows are returned raw; validation and counting of malformed rows happen in
//! the aggregator so every consumer reports skipped rows the same way.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::RawInteraction;
use chrono::{DateTime, Utc};

const SELECT_COLUMNS: &str =
    "SELECT author_id, reviewer_id, merge_request_id, kind, occurred_at FROM interactions";

/// Load every interaction at or after `cutoff`.
///
/// Rows without a timestamp are included so the aggregator can count them
/// as skipped instead of silently losing them in the filter.
pub async fn load_interactions_since(
    pool: &DbPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<RawInteraction>, AppError> {
    let query = format!(
        "{} WHERE occurred_at IS NULL OR occurred_at >= ? ORDER BY id",
        SELECT_COLUMNS
    );

    let rows = sqlx::query_as::<_, RawInteraction>(&query)
        .bind(cutoff.timestamp())
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Load one author's interactions at or after `cutoff`.
///
/// Rows with a NULL `author_id` never match and are only seen by
/// `load_interactions_since`.
pub async fn load_interactions_for_author(
    pool: &DbPool,
    author_id: i64,
    cutoff: DateTime<Utc>,
) -> Result<Vec<RawInteraction>, AppError> {
    let query = format!(
        "{} WHERE author_id = ? AND (occurred_at IS NULL OR occurred_at >= ?) ORDER BY id",
        SELECT_COLUMNS
    );

    let rows = sqlx::query_as::<_, RawInteraction>(&query)
        .bind(author_id)
        .bind(cutoff.timestamp())
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Append interaction rows in a single transaction.
///
/// # Returns
/// Number of rows written
pub async fn insert_interactions(
    pool: &DbPool,
    rows: &[RawInteraction],
) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (author_id, reviewer_id, merge_request_id, kind, occurred_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.author_id)
        .bind(row.reviewer_id)
        .bind(row.merge_request_id)
        .bind(&row.kind)
        .bind(row.occurred_at)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}
