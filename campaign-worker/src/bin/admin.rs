//! Campaigns Admin - database setup and user management.
//!
//! ```text
//! campaigns-admin init-db
//! campaigns-admin create-user --email ana@example.com --password s3cret --role admin
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campaigns::store::{self, DbPool, NewUser, Role, UserRepo};
use campaigns::web::password::hash_password;
use campaigns::Config;

/// Password given to the seeded accounts.
const SEED_PASSWORD: &str = "password";

/// Accounts created by `init-db` when absent.
const SEED_USERS: [(&str, Role); 2] = [
    ("admin@example.com", Role::Admin),
    ("user@example.com", Role::Standard),
];

#[derive(Parser, Debug)]
#[command(name = "campaigns-admin")]
#[command(about = "Database setup and user management for the campaign sender", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply migrations and create the default admin and standard users
    InitDb,

    /// Create a user
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// admin or standard
        #[arg(long, default_value = "standard")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let pool = store::connect(&config.database_url)
        .await
        .context("Failed to open database")?;
    store::migrate(&pool).await.context("Failed to migrate database")?;

    match cli.command {
        Commands::InitDb => init_db(&pool).await?,
        Commands::CreateUser { email, password, role } => {
            create_user(&pool, &email, &password, role).await?
        }
    }

    pool.close().await;
    Ok(())
}

async fn init_db(pool: &DbPool) -> Result<()> {
    for (email, role) in SEED_USERS {
        if UserRepo::find_by_email(pool, email).await?.is_some() {
            info!(email = email, "seed_user_exists");
            continue;
        }
        create_user(pool, email, SEED_PASSWORD, role).await?;
    }

    info!("database_initialized");
    Ok(())
}

async fn create_user(pool: &DbPool, email: &str, password: &str, role: Role) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        bail!("email and password must not be empty");
    }
    if UserRepo::find_by_email(pool, email).await?.is_some() {
        bail!("a user with email {email} already exists");
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    let user = UserRepo::create(
        pool,
        &NewUser {
            email: email.to_string(),
            password_hash,
            role,
        },
    )
    .await
    .context("Failed to create user")?;

    info!(uid = user.id, email = %user.email, role = role.as_str(), "user_created");
    Ok(())
}
