/// Embedded schema migrations
///
/// Migrations live in `keystone-shared/migrations/` as reversible pairs
/// (`{version}_{name}.up.sql` / `.down.sql`) and are compiled into the binary.
///
/// # Example
///
/// ```no_run
/// use keystone_shared::db::migrations::{get_migration_status, run_migrations};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// run_migrations(&pool).await?;
/// let status = get_migration_status(&pool).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{debug, info, warn};

/// Migrations compiled into the binary
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied state of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub applied_migrations: usize,

    /// Latest successfully applied version
    pub latest_version: Option<i64>,

    /// Embedded migrations not applied yet
    pub pending_migrations: usize,

    pub is_up_to_date: bool,
}

/// Versions of every embedded forward migration, ascending
pub fn embedded_versions() -> Vec<i64> {
    let mut versions: Vec<i64> = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    versions.dedup();
    versions
}

/// Applies all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("All database migrations completed successfully");
    Ok(())
}

/// Reverts every applied migration newer than `target`
///
/// `target = 0` reverts everything.
pub async fn revert_migrations(
    pool: &PgPool,
    target: i64,
) -> Result<(), sqlx::migrate::MigrateError> {
    info!(target, "Reverting database migrations");

    MIGRATOR.undo(pool, target).await.map_err(|e| {
        warn!(error = %e, target, "Migration revert failed");
        e
    })?;

    info!(target, "Database migrations reverted");
    Ok(())
}

/// Reads `_sqlx_migrations` and compares it with the embedded set
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    debug!("Checking migration status");

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if table_exists {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = true ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        debug!("Migrations table does not exist yet");
        Vec::new()
    };

    Ok(status_from(&applied, &embedded_versions()))
}

fn status_from(applied: &[i64], embedded: &[i64]) -> MigrationStatus {
    let pending_migrations = embedded.iter().filter(|v| !applied.contains(v)).count();

    MigrationStatus {
        applied_migrations: applied.len(),
        latest_version: applied.iter().copied().max(),
        pending_migrations,
        is_up_to_date: pending_migrations == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_present() {
        let versions = embedded_versions();
        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_embedded_migrations_reversible() {
        assert!(MIGRATOR.iter().all(|m| m.migration_type.is_reversible()));
    }

    #[test]
    fn test_status_fresh_database() {
        let status = status_from(&[], &[1, 2]);
        assert_eq!(status.applied_migrations, 0);
        assert_eq!(status.latest_version, None);
        assert_eq!(status.pending_migrations, 2);
        assert!(!status.is_up_to_date);
    }

    #[test]
    fn test_status_up_to_date() {
        let status = status_from(&[1, 2], &[1, 2]);
        assert_eq!(status.latest_version, Some(2));
        assert!(status.is_up_to_date);
    }
}
