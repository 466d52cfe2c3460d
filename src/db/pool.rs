//! Database connection pool abstraction
//!
//! One interface over the SQLite and MySQL backends. Repositories match on
//! `driver()` and borrow the concrete pool through `sqlite()` / `mysql()`;
//! asking for the other backend's pool is an error, not a panic.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// A connected backend.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement that returns no rows; yields rows affected
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round-trip a `SELECT 1`
    async fn ping(&self) -> Result<()>;

    fn driver(&self) -> DatabaseDriver;

    fn sqlite(&self) -> Result<&SqlitePool>;

    fn mysql(&self) -> Result<&MySqlPool>;
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

fn wrong_driver(requested: DatabaseDriver, actual: DatabaseDriver) -> anyhow::Error {
    anyhow!("{:?} pool requested from a {:?} connection", requested, actual)
}

/// SQLite, file-backed or in-memory
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connect, creating the database file and its directory if missing.
    ///
    /// Accepts `:memory:`, a `sqlite:` URL, or a bare file path.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = sqlite_options(url)?;

        if !is_memory_url(url) {
            let filename = options.clone().get_filename();
            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {}", parent.display())
                    })?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }
}

fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:")
}

/// Connection options for every accepted SQLite URL form.
///
/// In-memory URLs go through sqlx's parser so all pooled connections share
/// one database. Foreign keys are enforced on every connection.
fn sqlite_options(url: &str) -> Result<SqliteConnectOptions> {
    let options = if is_memory_url(url) {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else if url.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
    } else {
        SqliteConnectOptions::new()
            .filename(Path::new(url))
            .create_if_missing(true)
    };
    Ok(options.foreign_keys(true))
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        Ok(&self.pool)
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        Err(wrong_driver(DatabaseDriver::Mysql, DatabaseDriver::Sqlite))
    }
}

/// MySQL over a `mysql://` URL (the scheme may be omitted)
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    pub async fn connect(url: &str) -> Result<Self> {
        let full_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };
        let options = MySqlConnectOptions::from_str(&full_url)
            .with_context(|| format!("Invalid MySQL URL: {}", url))?;

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        Err(wrong_driver(DatabaseDriver::Sqlite, DatabaseDriver::Mysql))
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        Ok(&self.pool)
    }
}

/// Connect to the configured backend.
///
/// ```ignore
/// use coursehub::config::DatabaseConfig;
/// use coursehub::db::create_pool;
///
/// let pool = create_pool(&DatabaseConfig::default()).await?;
/// pool.ping().await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::connect(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::connect(&config.url).await?),
    };
    Ok(pool)
}

/// In-memory SQLite pool for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}
