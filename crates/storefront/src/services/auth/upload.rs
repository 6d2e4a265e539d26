//! Signed upload tokens for the image CDN.
//!
//! Admins receive `{signature, expire}` where `signature` is the hex
//! HMAC-SHA256 of the decimal expiry timestamp. The CDN checks it with the
//! same shared secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;

use super::tokens::ACCESS_TOKEN_TTL;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadToken {
    pub signature: String,
    pub expire: i64,
}

/// Sign an upload token valid for as long as an access token.
#[must_use]
pub fn upload_token(secret: &SecretString) -> UploadToken {
    upload_token_at(secret, Utc::now())
}

fn upload_token_at(secret: &SecretString, now: DateTime<Utc>) -> UploadToken {
    let expire = (now + ACCESS_TOKEN_TTL).timestamp();
    UploadToken {
        signature: sign(secret.expose_secret().as_bytes(), &expire.to_string()),
        expire,
    }
}

fn sign(key: &[u8], message: &str) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key) else {
        return String::new();
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
