//! User account types.
//!
//! Password hashes never leave the repository layer except as
//! [`Credentials`], which is not serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrina_core::{Email, PhoneNumber, UserId};

/// Longest accepted first or last name.
pub const MAX_NAME_LENGTH: usize = 100;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: PhoneNumber,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A user together with their password hash, for login checks.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: PhoneNumber,
    pub password: String,
}

impl NewUser {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        validate_name("first name", &self.first_name)?;
        validate_name("last name", &self.last_name)
    }
}

/// Body of `POST /auth/login`: an email address or an E.164 phone number.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// How a login identifies the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginId {
    Email(Email),
    Phone(PhoneNumber),
}

impl LoginRequest {
    /// Phone numbers start with `+`; anything else is read as an email.
    ///
    /// Returns `None` when the login is neither.
    #[must_use]
    pub fn login_id(&self) -> Option<LoginId> {
        let login = self.login.trim();
        if login.starts_with('+') {
            PhoneNumber::parse(login).ok().map(LoginId::Phone)
        } else {
            Email::parse(login).ok().map(LoginId::Email)
        }
    }
}

/// A password change, authorized by the current password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Body of `PATCH /users/me`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<PhoneNumber>,
    pub password: Option<PasswordChange>,
}

impl UserPatch {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(first_name) = &self.first_name {
            validate_name("first name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_name("last name", last_name)?;
        }
        Ok(())
    }
}

/// Body of `POST /auth/restore`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreRequest {
    pub email: Email,
}

/// Body of `POST /auth/restore/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreVerify {
    pub email: Email,
    pub code: String,
}

/// Body of `POST /auth/restore/complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreComplete {
    pub email: Email,
    pub code: String,
    pub password: String,
}

fn validate_name(field: &str, value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} is required"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("{field} is longer than {MAX_NAME_LENGTH} characters"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn login(value: &str) -> LoginRequest {
        LoginRequest {
            login: value.to_owned(),
            password: "irrelevant".to_owned(),
        }
    }

    #[test]
    fn test_login_by_phone_or_email() {
        assert_eq!(
            login("+380501234567").login_id(),
            Some(LoginId::Phone(PhoneNumber::parse("+380501234567").unwrap()))
        );
        assert_eq!(
            login(" Olena@Example.com ").login_id(),
            Some(LoginId::Email(Email::parse("olena@example.com").unwrap()))
        );
        assert_eq!(login("+12").login_id(), None);
        assert_eq!(login("nobody").login_id(), None);
    }

    #[test]
    fn test_patch_validates_present_names() {
        assert!(UserPatch::default().validate().is_ok());
        let patch = UserPatch {
            first_name: Some("  ".into()),
            ..UserPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_register_body() {
        let body: NewUser = serde_json::from_str(
            r#"{"firstName":"Olena","lastName":"Koval","email":"olena@example.com",
                "phoneNumber":"+380501234567","password":"correct horse"}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.email.as_str(), "olena@example.com");
    }
}
