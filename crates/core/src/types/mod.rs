//! Core types for the KaayaLife storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod envelope;
pub mod id;
pub mod pagination;
pub mod price;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use envelope::ApiResponse;
pub use id::*;
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest, Pagination};
pub use price::{CurrencyCode, Price, round_money};
pub use slug::{Slug, SlugError};
pub use status::*;
