use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;
use crate::services::activation_reconciler::ExamStatusStore;

/// Largest page `list_published_page` will return.
pub(crate) const MAX_PAGE_SIZE: i64 = 10_000;

pub(crate) const COLUMNS: &str = "\
    id, owner_id, title, status, window_start, window_end, course_id, class_ids, \
    created_at, updated_at, closed_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Keyset page of published exams ordered by id, starting after `after_id`.
/// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
pub(crate) async fn list_published_page(
    pool: &PgPool,
    after_id: Option<&str>,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM exams WHERE status = "));
    builder.push_bind(ExamStatus::Published);

    if let Some(after_id) = after_id {
        builder.push(" AND id > ");
        builder.push_bind(after_id);
    }

    builder.push(" ORDER BY id LIMIT ");
    builder.push_bind(limit.clamp(1, MAX_PAGE_SIZE));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) async fn list_published(
    pool: &PgPool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE status = $1 \
         ORDER BY window_start, id OFFSET $2 LIMIT $3"
    ))
    .bind(ExamStatus::Published)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_published(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE status = $1")
        .bind(ExamStatus::Published)
        .fetch_one(pool)
        .await
}

/// Conditional `published -> closed` transition. Window columns are never
/// part of this statement.
pub(crate) async fn close_if_published(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams SET status = $1, closed_at = $2, updated_at = $2 \
         WHERE id = $3 AND status = $4",
    )
    .bind(ExamStatus::Closed)
    .bind(now)
    .bind(id)
    .bind(ExamStatus::Published)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl ExamStatusStore for PgPool {
    async fn close_if_published(&self, exam_id: &str, now: PrimitiveDateTime) -> Result<bool> {
        Ok(close_if_published(self, exam_id, now).await?)
    }
}
