//! Fixtures shared by repository and service tests

use super::{create_test_pool, migrations, DynDatabasePool};

/// In-memory SQLite pool with every migration applied
pub async fn setup_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Insert a student account directly, bypassing the services
pub async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
    insert_user_with_role(pool, username, "student").await
}

pub async fn insert_user_with_role(pool: &DynDatabasePool, username: &str, role: &str) -> i64 {
    let now = chrono::Utc::now();
    sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(username)
    .bind(format!("{}@example.edu", username))
    .bind("hash")
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool.sqlite().expect("sqlite pool"))
    .await
    .expect("Failed to insert test user")
    .last_insert_rowid()
}

/// Insert a course owned by `instructor_id` and enroll the owner as instructor
pub async fn insert_course(pool: &DynDatabasePool, code: &str, instructor_id: i64) -> i64 {
    let sqlite = pool.sqlite().expect("sqlite pool");
    let now = chrono::Utc::now();
    let course_id = sqlx::query(
        "INSERT INTO courses (code, title, instructor_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(code)
    .bind(format!("{} title", code))
    .bind(instructor_id)
    .bind(now)
    .bind(now)
    .execute(sqlite)
    .await
    .expect("Failed to insert test course")
    .last_insert_rowid();

    enroll(pool, course_id, instructor_id, "instructor").await;
    course_id
}

pub async fn enroll(pool: &DynDatabasePool, course_id: i64, user_id: i64, role: &str) {
    sqlx::query("INSERT INTO enrollments (course_id, user_id, role, enrolled_at) VALUES (?, ?, ?, ?)")
        .bind(course_id)
        .bind(user_id)
        .bind(role)
        .bind(chrono::Utc::now())
        .execute(pool.sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to enroll test user");
}
