//! Vitrina Core - Shared domain types.
//!
//! This crate provides the types used across all Vitrina components:
//! - `storefront` - Catalog, account and checkout API server
//! - `cli` - Command-line tools for migrations, admin accounts and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Database encoding lives behind the `postgres`
//! feature so the types stay usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, languages, translations, prices, contact details
//!   and order state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
