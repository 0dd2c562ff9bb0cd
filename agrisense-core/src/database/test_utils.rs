use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

/// In-memory SQLite database with every migration applied.
///
/// Public so the server crate's integration tests can share it.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    crate::database::migrations::Migrator::up(&db, None).await?;
    Ok(db)
}
