//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Database URL from `VITRINA_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns the name of the missing variable.
pub fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();
    std::env::var("VITRINA_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "VITRINA_DATABASE_URL")
}
