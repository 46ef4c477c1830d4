/// Schema migrations
///
/// Migrations live in `chalk-shared/migrations/` and are embedded at
/// compile time with `sqlx::migrate!`.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applied migration summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Successfully applied migrations
    pub applied: usize,

    /// Most recent applied version
    pub latest_version: Option<i64>,

    /// Every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying database migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is current");
    Ok(())
}

/// Reports which migrations have been applied
pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let embedded = sqlx::migrate!("./migrations");
    let latest_embedded = embedded.iter().map(|m| m.version).max();

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
             WHERE table_schema = current_schema()
               AND table_name = '_sqlx_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("No migrations applied yet");
        return Ok(MigrationStatus {
            applied: 0,
            latest_version: None,
            is_up_to_date: latest_embedded.is_none(),
        });
    }

    let (applied, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus {
        applied: applied as usize,
        latest_version,
        is_up_to_date: latest_version >= latest_embedded,
    })
}

/// Creates the database named in `database_url` if it is missing
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database exists");
        return Ok(());
    }

    info!("Creating database");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_migrations_are_embedded() {
        let migrations = sqlx::migrate!("./migrations");
        assert!(migrations.iter().count() >= 1);
        assert!(migrations
            .iter()
            .any(|m| m.description.contains("initial schema")));
    }
}
