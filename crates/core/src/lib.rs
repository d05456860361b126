//! KaayaLife Core - Shared types library.
//!
//! This crate provides common types used across all KaayaLife components:
//! - `storefront` - JSON API server for the shop and its admin back office
//! - `cli` - Command-line tools for migrations, seeding, and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. The optional `postgres` feature adds `sqlx` encode/decode impls.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, emails, slugs, statuses, pagination, and
//!   the API response envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
