//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL behind the
//! `DatabasePool` trait; the driver is selected by configuration.
//!
//! # Usage
//!
//! ```ignore
//! use rafa::config::DatabaseConfig;
//! use rafa::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

#[cfg(test)]
pub(crate) mod fixtures;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
