//! Database module
//!
//! This module provides the SQLite persistence provider:
//! - Schema and migrations
//! - Model definitions
//! - `Repository`, the sqlx implementation of `storage::Store`

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::config::AppConfig;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(
    db_path: &Path,
    busy_timeout: Duration,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(busy_timeout)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool with default sizing.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    let config = AppConfig {
        database_path: db_path.to_path_buf(),
        ..AppConfig::default()
    };
    create_pool_with_config(&config).await
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool_with_config(config: &AppConfig) -> Result<SqlitePool> {
    let db_path = config.database_path.as_path();
    let busy_timeout = Duration::from_secs(config.busy_timeout_secs);

    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path, busy_timeout)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options(db_path, busy_timeout)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Create a migrated in-memory database.
///
/// Each SQLite in-memory connection is its own database, so the pool is
/// pinned to a single connection.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    initialize_database(&pool).await?;
    Ok(pool)
}
