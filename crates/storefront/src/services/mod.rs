//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Accounts, passwords, access/refresh tokens, password recovery
//! - `email` - Transactional email (restoration codes)
//! - `payments` - Checkout sessions and payment webhooks
//! - `checkout` - Order placement

pub mod auth;
pub mod checkout;
pub mod email;
pub mod payments;
