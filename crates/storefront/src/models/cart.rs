//! Cart and wishlist rows.
//!
//! Only product references and quantities are stored; prices are always read
//! from the live catalog when the cart is rendered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaaya_core::ProductId;

/// One product in a user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// One product on a user's wishlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}
