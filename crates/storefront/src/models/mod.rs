//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the `sqlx` row types in
//! [`crate::db`]. Both the `PostgreSQL` repositories and the in-memory
//! fallback store produce and consume these types.

pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod settings;
pub mod user;

pub use cart::{CartLine, WishlistEntry};
pub use category::{Category, CategoryChanges, CategoryNode, NewCategory};
pub use order::{NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, ShippingAddress};
pub use product::{NewProduct, Product, ProductChanges, ProductFilter, ProductSort};
pub use settings::{SocialLinks, StoreSettings};
pub use user::{NewUser, User};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim a free-text field, mapping blank input to `None`.
#[must_use]
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
