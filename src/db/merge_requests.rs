//! Readers for the upstream `merge_requests` table.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::RawMergeRequest;

const SELECT_COLUMNS: &str = r#"
    SELECT id AS mr_id, project_id, title, created_at, additions, deletions,
           last_pipeline_status, approvals_left, labels, notes_count_24h
    FROM merge_requests
"#;

/// Get a merge request row by ID.
pub async fn get_merge_request(
    pool: &DbPool,
    mr_id: i64,
) -> Result<Option<RawMergeRequest>, AppError> {
    let query = format!("{} WHERE id = ?", SELECT_COLUMNS);

    let row = sqlx::query_as::<_, RawMergeRequest>(&query)
        .bind(mr_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// List open merge requests for a project, ordered by ID.
pub async fn list_open_merge_requests(
    pool: &DbPool,
    project_id: i64,
) -> Result<Vec<RawMergeRequest>, AppError> {
    let query = format!(
        "{} WHERE project_id = ? AND state = 'opened' ORDER BY id",
        SELECT_COLUMNS
    );

    let rows = sqlx::query_as::<_, RawMergeRequest>(&query)
        .bind(project_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Insert or replace a merge request row.
///
/// `state` is one of `opened`, `merged`, `closed`.
pub async fn upsert_merge_request(
    pool: &DbPool,
    mr: &RawMergeRequest,
    state: &str,
) -> Result<(), AppError> {
    let mr_id = mr
        .mr_id
        .ok_or_else(|| AppError::invalid_input_field("merge request ID is required", "mr_id"))?;

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO merge_requests (
            id, project_id, title, state, created_at, additions, deletions,
            last_pipeline_status, approvals_left, labels, notes_count_24h
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(mr_id)
    .bind(mr.project_id)
    .bind(&mr.title)
    .bind(state)
    .bind(mr.created_at)
    .bind(mr.additions)
    .bind(mr.deletions)
    .bind(&mr.last_pipeline_status)
    .bind(mr.approvals_left)
    .bind(&mr.labels)
    .bind(mr.notes_count_24h)
    .execute(pool)
    .await?;

    Ok(())
}
