pub mod migrate;
pub mod seed;
pub mod token;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use kaaya_storefront::db::{self, RepositoryError, seed::SeedError};
use kaaya_storefront::services::auth::AuthError;
use kaaya_storefront::store::FallbackError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Seed failed: {0}")]
    Seed(#[from] SeedError),

    #[error("Invalid dataset: {0}")]
    Dataset(#[from] FallbackError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Account already exists with email: {0}")]
    UserExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Token error: {0}")]
    Token(#[from] AuthError),
}

/// Connect using `DATABASE_URL`.
pub(crate) async fn connect() -> Result<PgPool, CliError> {
    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
