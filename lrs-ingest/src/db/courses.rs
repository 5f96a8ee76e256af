//! Course directory reads
//!
//! The `courses` table belongs to the course catalog. The engine only reads
//! it; [`upsert_course`] is the registration hook the catalog side uses.

use sqlx::{Row, SqlitePool};

use lrs_common::Result;

use crate::identity::CourseDirectory;
use crate::models::Course;

pub async fn list_courses(pool: &SqlitePool) -> Result<Vec<Course>> {
    let rows = sqlx::query(
        "SELECT course_id, activity_id, title, expected_statements FROM courses ORDER BY course_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(course_from_row).collect())
}

/// Snapshot of the whole catalog for identity resolution
pub async fn load_directory(pool: &SqlitePool) -> Result<CourseDirectory> {
    Ok(CourseDirectory::new(list_courses(pool).await?))
}

pub async fn get_course(pool: &SqlitePool, course_id: &str) -> Result<Option<Course>> {
    let row = sqlx::query(
        "SELECT course_id, activity_id, title, expected_statements FROM courses WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(course_from_row))
}

pub async fn upsert_course(pool: &SqlitePool, course: &Course) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO courses (course_id, activity_id, title, expected_statements)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(course_id) DO UPDATE SET
            activity_id = excluded.activity_id,
            title = excluded.title,
            expected_statements = excluded.expected_statements,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&course.course_id)
    .bind(&course.activity_id)
    .bind(&course.title)
    .bind(course.expected_statements.map(i64::from))
    .execute(pool)
    .await?;

    Ok(())
}

fn course_from_row(row: &sqlx::sqlite::SqliteRow) -> Course {
    let expected: Option<i64> = row.get("expected_statements");
    Course {
        course_id: row.get("course_id"),
        activity_id: row.get("activity_id"),
        title: row.get("title"),
        expected_statements: expected.and_then(|n| u32::try_from(n).ok()),
    }
}
