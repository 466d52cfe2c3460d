//! Database layer
//!
//! SQLite is the default single-file deployment; MySQL is available for larger
//! installs. The driver is picked from configuration and hidden behind
//! [`DatabasePool`].
//!
//! ```ignore
//! use coursehub::config::DatabaseConfig;
//! use coursehub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_support;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
