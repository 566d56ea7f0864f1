use sqlx::PgPool;

use crate::db::models::Student;
use crate::services::target_resolver::StudentFacts;

pub(crate) const COLUMNS: &str = "id, full_name, class_id, is_active, created_at, updated_at";

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {COLUMNS} FROM students WHERE id = $1 AND is_active = TRUE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_course_ids(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT course_id FROM course_enrollments WHERE student_id = $1 ORDER BY course_id",
    )
    .bind(student_id)
    .fetch_all(executor)
    .await
}

/// Reads class and course enrollment inside one repeatable-read transaction so
/// both describe the same moment. `None` for unknown or inactive students.
pub(crate) async fn load_facts(
    pool: &PgPool,
    student_id: &str,
) -> Result<Option<StudentFacts>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let Some(student) = find_active(&mut *tx, student_id).await? else {
        tx.rollback().await?;
        return Ok(None);
    };
    let course_ids = list_course_ids(&mut *tx, student_id).await?;
    tx.commit().await?;

    Ok(Some(StudentFacts { class_id: student.class_id, course_ids: course_ids.into_iter().collect() }))
}
