//! Prices in minor currency units.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative (got {0})")]
    Negative(i64),
}

/// A non-negative amount in the smallest unit of the store currency
/// (kopiyky for UAH, cents for USD/EUR).
///
/// Stored as `BIGINT`; the payment processor receives the same integer as
/// `unit_amount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Price(i64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create a price from minor units.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for negative amounts.
    pub const fn from_minor(amount: i64) -> Result<Self, PriceError> {
        if amount < 0 {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Multiply by a line quantity, saturating on overflow.
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl TryFrom<i64> for Price {
    type Error = PriceError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        Self::from_minor(amount)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// ISO 4217 currency the store charges in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    /// Ukrainian hryvnia.
    #[default]
    Uah,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
}

impl CurrencyCode {
    /// Lowercase code, as payment APIs expect it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uah => "uah",
            Self::Usd => "usd",
            Self::Eur => "eur",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uah" => Ok(Self::Uah),
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::from_minor(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Price::from_minor(-1), Err(PriceError::Negative(-1)));
        assert!(serde_json::from_str::<Price>("-5").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_minor(129_900).unwrap().to_string(), "1299.00");
        assert_eq!(Price::from_minor(5).unwrap().to_string(), "0.05");
    }

    #[test]
    fn test_times() {
        let price = Price::from_minor(1_250).unwrap();
        assert_eq!(price.times(3).minor_units(), 3_750);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("UAH".parse::<CurrencyCode>().unwrap(), CurrencyCode::Uah);
        assert!("btc".parse::<CurrencyCode>().is_err());
    }
}
