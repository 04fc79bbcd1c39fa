use sqlx::migrate::Migrator;
use tracing::info;

use super::{DbPool, DbPoolError};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_migrations(pool: &DbPool) -> Result<(), DbPoolError> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.iter().count(), "builds schema up to date");
    Ok(())
}
