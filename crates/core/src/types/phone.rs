//! Phone number type (E.164).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// The number does not start with `+`.
    #[error("phone number must start with '+'")]
    MissingPlus,
    /// A character other than a digit follows the `+`.
    #[error("phone number may only contain digits after '+'")]
    InvalidCharacter,
    /// The digit count is outside the E.164 range.
    #[error("phone number must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
    /// Country codes never start with zero.
    #[error("country code cannot start with 0")]
    LeadingZero,
}

/// A phone number in E.164 form, e.g. `+380501234567`.
///
/// Phone numbers double as login identifiers, so they are stored exactly in
/// this canonical form and compared byte-for-byte.
///
/// ```
/// use vitrina_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("+380501234567").is_ok());
/// assert!(PhoneNumber::parse("0501234567").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Fewest digits accepted after the `+`.
    pub const MIN_DIGITS: usize = 8;
    /// Most digits E.164 allows after the `+`.
    pub const MAX_DIGITS: usize = 15;

    /// Parse a phone number in E.164 form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not `+` followed by 8-15 digits with a
    /// non-zero first digit.
    pub fn parse(s: &str) -> Result<Self, PhoneNumberError> {
        let s = s.trim();
        let digits = s.strip_prefix('+').ok_or(PhoneNumberError::MissingPlus)?;

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneNumberError::InvalidCharacter);
        }
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneNumberError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }
        if digits.starts_with('0') {
            return Err(PhoneNumberError::LeadingZero);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            PhoneNumber::parse(" +380501234567 ").unwrap().as_str(),
            "+380501234567"
        );
        assert!(PhoneNumber::parse("+14155552671").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            PhoneNumber::parse("380501234567"),
            Err(PhoneNumberError::MissingPlus)
        );
        assert_eq!(
            PhoneNumber::parse("+38 050 123"),
            Err(PhoneNumberError::InvalidCharacter)
        );
        assert!(matches!(
            PhoneNumber::parse("+1234"),
            Err(PhoneNumberError::InvalidLength { .. })
        ));
        assert_eq!(
            PhoneNumber::parse("+0501234567"),
            Err(PhoneNumberError::LeadingZero)
        );
    }
}
