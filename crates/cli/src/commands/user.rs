//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! kaaya-cli user create -e admin@kaayalife.in -n "Store Admin" -r admin
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use kaaya_core::{Email, UserRole};
use kaaya_storefront::db::{RepositoryError, UserRepository};
use kaaya_storefront::models::NewUser;

use super::{CliError, connect};

/// Create a new account.
///
/// # Returns
///
/// The id of the created account.
pub async fn create(
    email: &str,
    name: &str,
    phone: Option<String>,
    role: &str,
) -> Result<i32, CliError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|e| CliError::InvalidEmail(format!("{email}: {e}")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidArgument("name must not be empty".to_owned()));
    }

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    tracing::info!("Creating account: {} ({})", email, role);
    let user = users
        .create(&NewUser {
            name: name.to_owned(),
            email: email.clone(),
            phone: phone.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()),
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => CliError::UserExists(email.to_string()),
            other => CliError::Repository(other),
        })?;

    tracing::info!("Account created with id {}", user.id);
    Ok(user.id.as_i32())
}
