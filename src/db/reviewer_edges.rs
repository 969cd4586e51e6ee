//! Persistence for the materialized reviewer graph.
//!
//! Each aggregation run replaces the whole edge set in one transaction, so a
//! reader never observes a mix of two runs.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{from_unix, Edge};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Replace the stored edge set with `edges`.
///
/// # Returns
/// Number of edges written
pub async fn replace_edges(
    pool: &DbPool,
    edges: &[Edge],
    computed_at: DateTime<Utc>,
) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM reviewer_edges")
        .execute(&mut *tx)
        .await?;

    let mut written = 0u64;
    for edge in edges {
        let result = sqlx::query(
            r#"
            INSERT INTO reviewer_edges (
                author_id, reviewer_id, interaction_count, approval_count, review_count,
                comment_count, first_interaction_at, last_interaction_at, weight, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(edge.author_id)
        .bind(edge.reviewer_id)
        .bind(edge.interaction_count as i64)
        .bind(edge.approval_count as i64)
        .bind(edge.review_count as i64)
        .bind(edge.comment_count as i64)
        .bind(edge.first_interaction_at.timestamp())
        .bind(edge.last_interaction_at.timestamp())
        .bind(edge.weight)
        .bind(computed_at.timestamp())
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Get all stored edges for one author (unordered; ranking is done by the caller).
pub async fn get_edges_for_author(pool: &DbPool, author_id: i64) -> Result<Vec<Edge>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT author_id, reviewer_id, interaction_count, approval_count, review_count,
               comment_count, first_interaction_at, last_interaction_at, weight
        FROM reviewer_edges
        WHERE author_id = ?
        "#,
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(edge_from_row).collect()
}

/// When the stored graph was last rebuilt, if ever.
pub async fn last_computed_at(pool: &DbPool) -> Result<Option<DateTime<Utc>>, AppError> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(computed_at) FROM reviewer_edges")
        .fetch_one(pool)
        .await?;

    Ok(row.0.and_then(from_unix))
}

fn edge_from_row(row: &SqliteRow) -> Result<Edge, AppError> {
    let timestamp = |column: &str| -> Result<DateTime<Utc>, AppError> {
        let secs: i64 = row.try_get(column)?;
        from_unix(secs).ok_or_else(|| {
            AppError::database_with_op(format!("invalid {}: {}", column, secs), "get_edges_for_author")
        })
    };
    let count = |column: &str| -> Result<u32, AppError> {
        let value: i64 = row.try_get(column)?;
        Ok(u32::try_from(value).unwrap_or(0))
    };

    Ok(Edge {
        author_id: row.try_get("author_id")?,
        reviewer_id: row.try_get("reviewer_id")?,
        interaction_count: count("interaction_count")?,
        approval_count: count("approval_count")?,
        review_count: count("review_count")?,
        comment_count: count("comment_count")?,
        first_interaction_at: timestamp("first_interaction_at")?,
        last_interaction_at: timestamp("last_interaction_at")?,
        weight: row.try_get("weight")?,
    })
}
