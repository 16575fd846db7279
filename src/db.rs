use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::AppConfig;
use crate::migrator::Migrator;

/// Establishes a database connection pool from the application config.
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    // A pooled `sqlite::memory:` hands each connection its own empty
    // database; collapse the pool so every task sees the same data.
    if database_url.starts_with("sqlite::memory:") {
        opts.max_connections(1).min_connections(1);
    }

    let conn = Database::connect(opts).await?;
    info!("Database connection established");
    Ok(conn)
}

pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DatabaseConnection, DbErr> {
    establish_connection(&cfg.database_url).await
}

/// Applies all pending migrations.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(conn, None).await?;
    info!("Database migrations applied");
    Ok(())
}
