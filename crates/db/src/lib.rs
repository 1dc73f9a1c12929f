//! SQLite persistence layer for waveclip.
//!
//! Exposes the connection-pool bootstrap, embedded migrations, and the
//! repository layer. The `VideoProjectRepo` is the only mutator of
//! render-job state; everything else in the system goes through it.

pub mod models;
pub mod repositories;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Pool alias used throughout the workspace.
pub type DbPool = SqlitePool;

/// Create the SQLite connection pool.
///
/// The database file is created on first run; foreign keys are enforced
/// on every connection.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
