//! Supported content languages.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A language code that is not one of the supported languages.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

/// A content language.
///
/// Every translated field carries exactly one row per language. The code is what
/// clients send in `Content-Language` and what the `lang` columns store; the
/// text-search configuration drives `to_tsvector`/`plainto_tsquery`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Ukrainian.
    Ua,
}

impl Language {
    /// All supported languages, in storage order.
    pub const ALL: [Self; 2] = [Self::En, Self::Ua];

    /// The code stored in `lang` columns and accepted from clients.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ua => "ua",
        }
    }

    /// Name of the Postgres text-search configuration for this language.
    #[must_use]
    pub const fn regconfig(self) -> &'static str {
        match self {
            Self::En => "english",
            Self::Ua => "ukrainian",
        }
    }

    /// Resolve a client-supplied header value, falling back to the default.
    ///
    /// Accepts region suffixes and casing variants (`uk-UA`, `EN`).
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        let primary = value
            .split(',')
            .next()
            .and_then(|tag| tag.split(['-', '_']).next())
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match primary.as_str() {
            "ua" | "uk" => Self::Ua,
            _ => Self::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "ua" => Ok(Self::Ua),
            other => Err(UnknownLanguage(other.to_owned())),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Language {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Language {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let code = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(code.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Language {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}
