//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaaya_core::{Email, UserId, UserRole};

/// A storefront account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user (CLI and seeding).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
}
