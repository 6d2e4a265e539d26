//! Core types for Vitrina.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod language;
pub mod phone;
pub mod price;
pub mod status;
pub mod translations;

pub use email::{Email, EmailError};
pub use id::*;
pub use language::{Language, UnknownLanguage};
pub use phone::{PhoneNumber, PhoneNumberError};
pub use price::{CurrencyCode, Price, PriceError};
pub use status::*;
pub use translations::Translations;
