//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Bearer-token decoding and development token minting
//! - `backend` - Client for the upstream backend (login proxy)
//! - `catalog` - Categories, category tree, and menu management
//! - `products` - Product listing, detail, admin edits, bulk actions
//! - `orders` - Checkout pricing, order history, status updates
//! - `cart` - Cart totals and wishlist
//! - `settings` - Typed store settings with partial updates
//!
//! Services borrow what they need from [`crate::state::AppState`] and are
//! constructed per request.

pub mod auth;
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod products;
pub mod settings;
