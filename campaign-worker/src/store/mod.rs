//! Persistence for users, campaigns and campaign errors.
//!
//! SQLite through sqlx. Repositories are stateless structs whose methods take
//! the pool explicitly, so the web server and the dispatcher share nothing but
//! the database.

pub mod campaigns;
pub mod models;
pub mod users;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use campaigns::CampaignRepo;
pub use models::{
    Campaign, CampaignError, CampaignStatus, DbId, NewCampaign, NewUser, Role, ScheduleMode,
    User, UserChanges, UserView,
};
pub use users::UserRepo;

/// Connection pool shared by every repository.
pub type DbPool = SqlitePool;

/// Open (creating if needed) the database at `url`.
///
/// File databases run in WAL mode so status reads never block on a
/// dispatcher writing the same row.
pub async fn connect(url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    info!(url_length = url.len(), "database_connected");
    Ok(pool)
}

/// Open a private in-memory database with the schema applied.
///
/// The pool is pinned to a single connection that never expires; every new
/// SQLite memory connection would otherwise see an empty database.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply pending migrations from `migrations/`.
pub async fn migrate(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database_migrated");
    Ok(())
}
