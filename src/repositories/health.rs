use sqlx::PgPool;

/// `Ok(false)` when the database answers but the exams table is missing.
pub(crate) async fn schema_ready(pool: &PgPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT to_regclass('public.exams') IS NOT NULL").fetch_one(pool).await
}
