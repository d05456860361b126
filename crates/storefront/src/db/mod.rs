//! Database operations for the storefront `PostgreSQL` store.
//!
//! ## Tables (schema `kaaya`)
//!
//! - `category` - Catalog categories and menu placement
//! - `product` - Catalog products
//! - `customer_order` / `order_item` - Orders and their lines
//! - `app_user` - Accounts (customers and admins)
//! - `cart_item` / `wishlist_item` - Per-user cart and wishlist
//! - `setting` - Store settings as key/value JSONB
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p kaaya-cli -- migrate
//! ```

pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod seed;
pub mod settings;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use orders::{DUPLICATE_ORDER_NUMBER, OrderRepository};
pub use products::ProductRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug, insufficient stock).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether the error came from the database itself (connection loss,
    /// timeouts, query failures) rather than from the data.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a stored slug back into a validated [`kaaya_core::Slug`].
pub(crate) fn parse_slug(raw: &str) -> Result<kaaya_core::Slug, RepositoryError> {
    kaaya_core::Slug::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid slug '{raw}' in database: {e}")))
}
