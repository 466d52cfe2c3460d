//! Course and enrollment repository

use super::like_pattern;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseFilter, Enrollment, EnrollmentRole, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course; `course.id` is ignored
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>>;

    /// Persist title and description
    async fn update(&self, course: &Course) -> Result<Course>;

    /// Delete a course together with its forum likes; everything else cascades
    async fn delete(&self, id: i64) -> Result<()>;

    async fn list(&self, filter: &CourseFilter, params: &ListParams) -> Result<(Vec<Course>, i64)>;

    /// Insert an enrollment if missing. Returns false if the user was already enrolled.
    async fn enroll(&self, course_id: i64, user_id: i64, role: EnrollmentRole) -> Result<bool>;

    /// Insert an enrollment or change the role of an existing one
    async fn upsert_enrollment(&self, course_id: i64, user_id: i64, role: EnrollmentRole) -> Result<()>;

    /// Returns false if there was nothing to remove
    async fn unenroll(&self, course_id: i64, user_id: i64) -> Result<bool>;

    async fn get_enrollment(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>>;

    /// Enrollments ordered instructors first, then by enrollment time
    async fn list_members(&self, course_id: i64, params: &ListParams) -> Result<(Vec<Enrollment>, i64)>;

    /// All member ids, optionally restricted to one role
    async fn member_ids(&self, course_id: i64, role: Option<EnrollmentRole>) -> Result<Vec<i64>>;
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_course_sqlite(self.pool.sqlite()?, course).await,
            DatabaseDriver::Mysql => create_course_mysql(self.pool.mysql()?, course).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_course_sqlite(self.pool.sqlite()?, CourseKey::Id(id)).await,
            DatabaseDriver::Mysql => get_course_mysql(self.pool.mysql()?, CourseKey::Id(id)).await,
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_course_sqlite(self.pool.sqlite()?, CourseKey::Code(code)).await,
            DatabaseDriver::Mysql => get_course_mysql(self.pool.mysql()?, CourseKey::Code(code)).await,
        }
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_course_sqlite(self.pool.sqlite()?, course).await,
            DatabaseDriver::Mysql => update_course_mysql(self.pool.mysql()?, course).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_course_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_course_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, filter: &CourseFilter, params: &ListParams) -> Result<(Vec<Course>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_courses_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_courses_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn enroll(&self, course_id: i64, user_id: i64, role: EnrollmentRole) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO enrollments (course_id, user_id, role, enrolled_at) VALUES (?, ?, ?, ?)",
            )
            .bind(course_id)
            .bind(user_id)
            .bind(role.to_string())
            .bind(Utc::now())
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to enroll user")?
            .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO enrollments (course_id, user_id, role, enrolled_at) VALUES (?, ?, ?, ?)",
            )
            .bind(course_id)
            .bind(user_id)
            .bind(role.to_string())
            .bind(Utc::now())
            .execute(self.pool.mysql()?)
            .await
            .context("Failed to enroll user")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn upsert_enrollment(&self, course_id: i64, user_id: i64, role: EnrollmentRole) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO enrollments (course_id, user_id, role, enrolled_at) VALUES (?, ?, ?, ?)
                    ON CONFLICT(course_id, user_id) DO UPDATE SET role = excluded.role
                    "#,
                )
                .bind(course_id)
                .bind(user_id)
                .bind(role.to_string())
                .bind(Utc::now())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to upsert enrollment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO enrollments (course_id, user_id, role, enrolled_at) VALUES (?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE role = VALUES(role)
                    "#,
                )
                .bind(course_id)
                .bind(user_id)
                .bind(role.to_string())
                .bind(Utc::now())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to upsert enrollment")?;
            }
        }
        Ok(())
    }

    async fn unenroll(&self, course_id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM enrollments WHERE course_id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(course_id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to unenroll user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(course_id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to unenroll user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_enrollment(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>> {
        let sql = "SELECT course_id, user_id, role, enrolled_at FROM enrollments WHERE course_id = ? AND user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(course_id)
                .bind(user_id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get enrollment")?
                .as_ref()
                .map(row_to_enrollment_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(course_id)
                .bind(user_id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get enrollment")?
                .as_ref()
                .map(row_to_enrollment_mysql)
                .transpose(),
        }
    }

    async fn list_members(&self, course_id: i64, params: &ListParams) -> Result<(Vec<Enrollment>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_members_sqlite(self.pool.sqlite()?, course_id, params).await,
            DatabaseDriver::Mysql => list_members_mysql(self.pool.mysql()?, course_id, params).await,
        }
    }

    async fn member_ids(&self, course_id: i64, role: Option<EnrollmentRole>) -> Result<Vec<i64>> {
        let sql = "SELECT user_id FROM enrollments WHERE course_id = ? AND (? IS NULL OR role = ?) ORDER BY user_id";
        let role = role.map(|r| r.to_string());
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(course_id)
                .bind(&role)
                .bind(&role)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list member ids")?
                .iter()
                .map(|row| row.get("user_id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(course_id)
                .bind(&role)
                .bind(&role)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list member ids")?
                .iter()
                .map(|row| row.get("user_id"))
                .collect(),
        };
        Ok(ids)
    }
}

const COURSE_COLUMNS: &str = "id, code, title, description, instructor_id, created_at, updated_at";

const INSERT_COURSE: &str = r#"
    INSERT INTO courses (code, title, description, instructor_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_COURSE: &str = "UPDATE courses SET title = ?, description = ?, updated_at = ? WHERE id = ?";

/// Likes on the course's posts and on replies to those posts
const DELETE_COURSE_LIKES: [&str; 2] = [
    r#"DELETE FROM forum_likes WHERE target_type = 'reply' AND target_id IN (
        SELECT r.id FROM forum_replies r JOIN forum_posts p ON p.id = r.post_id WHERE p.course_id = ?)"#,
    r#"DELETE FROM forum_likes WHERE target_type = 'post' AND target_id IN (
        SELECT id FROM forum_posts WHERE course_id = ?)"#,
];

const LIST_FILTER: &str = r#"
    (? IS NULL OR code LIKE ? ESCAPE '!' OR title LIKE ? ESCAPE '!')
    AND (? IS NULL OR id IN (SELECT course_id FROM enrollments WHERE user_id = ?))
"#;

const MEMBER_ORDER: &str =
    "ORDER BY CASE role WHEN 'instructor' THEN 0 ELSE 1 END, enrolled_at ASC, user_id ASC";

#[derive(Clone, Copy)]
enum CourseKey<'a> {
    Id(i64),
    Code(&'a str),
}

impl CourseKey<'_> {
    fn column(&self) -> &'static str {
        match self {
            CourseKey::Id(_) => "id",
            CourseKey::Code(_) => "code",
        }
    }
}

fn parse_enrollment_role(role: &str) -> Result<EnrollmentRole> {
    EnrollmentRole::from_str(role).with_context(|| format!("Invalid enrollment role in database: {}", role))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_course_sqlite(pool: &SqlitePool, course: &Course) -> Result<Course> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_COURSE)
        .bind(&course.code)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.instructor_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..course.clone()
    })
}

async fn get_course_sqlite(pool: &SqlitePool, key: CourseKey<'_>) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE {} = ?", COURSE_COLUMNS, key.column());
    let query = sqlx::query(&sql);
    let query = match key {
        CourseKey::Id(id) => query.bind(id),
        CourseKey::Code(code) => query.bind(code.to_string()),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get course by {}", key.column()))?;

    Ok(row.as_ref().map(row_to_course_sqlite))
}

async fn update_course_sqlite(pool: &SqlitePool, course: &Course) -> Result<Course> {
    sqlx::query(UPDATE_COURSE)
        .bind(&course.title)
        .bind(&course.description)
        .bind(Utc::now())
        .bind(course.id)
        .execute(pool)
        .await
        .context("Failed to update course")?;

    get_course_sqlite(pool, CourseKey::Id(course.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
}

async fn delete_course_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    for sql in DELETE_COURSE_LIKES {
        sqlx::query(sql)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete course likes")?;
    }
    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(())
}

async fn list_courses_sqlite(
    pool: &SqlitePool,
    filter: &CourseFilter,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let pattern = filter.search.as_deref().map(like_pattern);

    let sql = format!(
        "SELECT {} FROM courses WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS, LIST_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.member_id)
        .bind(filter.member_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM courses WHERE {}", LIST_FILTER);
    let total: i64 = sqlx::query(&count_sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.member_id)
        .bind(filter.member_id)
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?
        .get("count");

    Ok((rows.iter().map(row_to_course_sqlite).collect(), total))
}

async fn list_members_sqlite(
    pool: &SqlitePool,
    course_id: i64,
    params: &ListParams,
) -> Result<(Vec<Enrollment>, i64)> {
    let sql = format!(
        "SELECT course_id, user_id, role, enrolled_at FROM enrollments WHERE course_id = ? {} LIMIT ? OFFSET ?",
        MEMBER_ORDER
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list members")?;

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM enrollments WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .context("Failed to count members")?
        .get("count");

    let members = rows.iter().map(row_to_enrollment_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((members, total))
}

fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        title: row.get("title"),
        description: row.get("description"),
        instructor_id: row.get("instructor_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_enrollment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Enrollment> {
    Ok(Enrollment {
        course_id: row.get("course_id"),
        user_id: row.get("user_id"),
        role: parse_enrollment_role(row.get("role"))?,
        enrolled_at: row.get("enrolled_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_course_mysql(pool: &MySqlPool, course: &Course) -> Result<Course> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_COURSE)
        .bind(&course.code)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.instructor_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..course.clone()
    })
}

async fn get_course_mysql(pool: &MySqlPool, key: CourseKey<'_>) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE {} = ?", COURSE_COLUMNS, key.column());
    let query = sqlx::query(&sql);
    let query = match key {
        CourseKey::Id(id) => query.bind(id),
        CourseKey::Code(code) => query.bind(code.to_string()),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get course by {}", key.column()))?;

    Ok(row.as_ref().map(row_to_course_mysql))
}

async fn update_course_mysql(pool: &MySqlPool, course: &Course) -> Result<Course> {
    sqlx::query(UPDATE_COURSE)
        .bind(&course.title)
        .bind(&course.description)
        .bind(Utc::now())
        .bind(course.id)
        .execute(pool)
        .await
        .context("Failed to update course")?;

    get_course_mysql(pool, CourseKey::Id(course.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
}

async fn delete_course_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    for sql in DELETE_COURSE_LIKES {
        sqlx::query(sql)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete course likes")?;
    }
    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(())
}

async fn list_courses_mysql(
    pool: &MySqlPool,
    filter: &CourseFilter,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let pattern = filter.search.as_deref().map(like_pattern);

    let sql = format!(
        "SELECT {} FROM courses WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS, LIST_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.member_id)
        .bind(filter.member_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM courses WHERE {}", LIST_FILTER);
    let total: i64 = sqlx::query(&count_sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.member_id)
        .bind(filter.member_id)
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?
        .get("count");

    Ok((rows.iter().map(row_to_course_mysql).collect(), total))
}

async fn list_members_mysql(
    pool: &MySqlPool,
    course_id: i64,
    params: &ListParams,
) -> Result<(Vec<Enrollment>, i64)> {
    let sql = format!(
        "SELECT course_id, user_id, role, enrolled_at FROM enrollments WHERE course_id = ? {} LIMIT ? OFFSET ?",
        MEMBER_ORDER
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list members")?;

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM enrollments WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .context("Failed to count members")?
        .get("count");

    let members = rows.iter().map(row_to_enrollment_mysql).collect::<Result<Vec<_>>>()?;
    Ok((members, total))
}

fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Course {
    Course {
        id: row.get("id"),
        code: row.get("code"),
        title: row.get("title"),
        description: row.get("description"),
        instructor_id: row.get("instructor_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_enrollment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Enrollment> {
    Ok(Enrollment {
        course_id: row.get("course_id"),
        user_id: row.get("user_id"),
        role: parse_enrollment_role(row.get("role"))?,
        enrolled_at: row.get("enrolled_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, insert_user_with_role, setup_pool};

    fn course(code: &str, instructor_id: i64) -> Course {
        let now = Utc::now();
        Course {
            id: 0,
            code: code.to_string(),
            title: format!("{} course", code),
            description: None,
            instructor_id,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (DynDatabasePool, SqlxCourseRepository, i64) {
        let pool = setup_pool().await;
        let prof = insert_user_with_role(&pool, "prof", "instructor").await;
        (pool.clone(), SqlxCourseRepository::new(pool), prof)
    }

    #[tokio::test]
    async fn test_create_get_update_course() {
        let (_pool, repo, prof) = setup().await;

        let created = repo.create(&course("CS101", prof)).await.expect("Failed to create course");
        assert!(created.id > 0);

        let by_code = repo.get_by_code("CS101").await.unwrap().expect("by code");
        assert_eq!(by_code.id, created.id);

        let mut changed = by_code.clone();
        changed.title = "Intro to Computing".to_string();
        changed.description = Some("Basics".to_string());
        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.title, "Intro to Computing");
        assert_eq!(updated.description.as_deref(), Some("Basics"));

        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let (_pool, repo, prof) = setup().await;
        repo.create(&course("CS101", prof)).await.unwrap();
        assert!(repo.create(&course("CS101", prof)).await.is_err());
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let (pool, repo, prof) = setup().await;
        let student = insert_user(&pool, "student").await;
        let c = repo.create(&course("CS101", prof)).await.unwrap();

        assert!(repo.enroll(c.id, student, EnrollmentRole::Student).await.unwrap());
        assert!(!repo.enroll(c.id, student, EnrollmentRole::Student).await.unwrap());

        let enrollment = repo.get_enrollment(c.id, student).await.unwrap().expect("enrolled");
        assert_eq!(enrollment.role, EnrollmentRole::Student);

        repo.upsert_enrollment(c.id, student, EnrollmentRole::Instructor).await.unwrap();
        let enrollment = repo.get_enrollment(c.id, student).await.unwrap().unwrap();
        assert_eq!(enrollment.role, EnrollmentRole::Instructor);

        assert!(repo.unenroll(c.id, student).await.unwrap());
        assert!(!repo.unenroll(c.id, student).await.unwrap());
        assert!(repo.get_enrollment(c.id, student).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_members_and_member_ids() {
        let (pool, repo, prof) = setup().await;
        let s1 = insert_user(&pool, "s1").await;
        let s2 = insert_user(&pool, "s2").await;
        let c = repo.create(&course("CS101", prof)).await.unwrap();
        repo.enroll(c.id, s1, EnrollmentRole::Student).await.unwrap();
        repo.enroll(c.id, prof, EnrollmentRole::Instructor).await.unwrap();
        repo.enroll(c.id, s2, EnrollmentRole::Student).await.unwrap();

        let (members, total) = repo.list_members(c.id, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(members[0].user_id, prof);

        let instructors = repo.member_ids(c.id, Some(EnrollmentRole::Instructor)).await.unwrap();
        assert_eq!(instructors, vec![prof]);

        let everyone = repo.member_ids(c.id, None).await.unwrap();
        assert_eq!(everyone.len(), 3);
    }

    #[tokio::test]
    async fn test_list_courses_with_filters() {
        let (pool, repo, prof) = setup().await;
        let student = insert_user(&pool, "student").await;
        let cs = repo.create(&course("CS101", prof)).await.unwrap();
        repo.create(&course("MATH200", prof)).await.unwrap();
        repo.enroll(cs.id, student, EnrollmentRole::Student).await.unwrap();

        let params = ListParams::default();
        let (_, total) = repo.list(&CourseFilter::default(), &params).await.unwrap();
        assert_eq!(total, 2);

        let search = CourseFilter { search: Some("math".to_string()), member_id: None };
        let (found, _) = repo.list(&search, &params).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "MATH200");

        let mine = CourseFilter { search: None, member_id: Some(student) };
        let (found, total) = repo.list(&mine, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, cs.id);
    }

    #[tokio::test]
    async fn test_delete_course_removes_forum_likes() {
        let (pool, repo, prof) = setup().await;
        let c = repo.create(&course("CS101", prof)).await.unwrap();
        let sqlite = pool.sqlite().unwrap();

        let post_id = sqlx::query("INSERT INTO forum_posts (course_id, author_id, title, content) VALUES (?, ?, 't', 'c')")
            .bind(c.id)
            .bind(prof)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query("INSERT INTO forum_likes (target_type, target_id, user_id) VALUES ('post', ?, ?)")
            .bind(post_id)
            .bind(prof)
            .execute(sqlite)
            .await
            .unwrap();

        repo.delete(c.id).await.expect("Failed to delete course");

        assert!(repo.get_by_id(c.id).await.unwrap().is_none());
        let likes: i64 = sqlx::query("SELECT COUNT(*) as count FROM forum_likes")
            .fetch_one(sqlite)
            .await
            .unwrap()
            .get("count");
        assert_eq!(likes, 0);
    }
}
