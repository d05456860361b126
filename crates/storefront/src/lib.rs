//! KaayaLife Storefront library.
//!
//! The JSON API server for the shop and its admin back office, as a library
//! so that the binary, the CLI, and the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
