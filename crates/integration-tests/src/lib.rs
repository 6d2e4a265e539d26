//! Integration tests for Vitrina.
//!
//! The tests drive a running storefront over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate a scratch database and create an admin
//! cargo run -p vitrina-cli -- migrate
//! cargo run -p vitrina-cli -- admin create -e "$TEST_ADMIN_EMAIL" -p "$TEST_ADMIN_PASSWORD" --phone +380500000001
//!
//! # Start the server (plain HTTP, so the refresh cookie must not be Secure),
//! # then run the ignored tests
//! VITRINA_COOKIE_SECURE=false cargo run -p vitrina-storefront &
//! cargo test -p vitrina-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - server under test (default `http://localhost:8080`)
//! - `TEST_ADMIN_EMAIL` / `TEST_ADMIN_PASSWORD` - admin account for catalog writes
//! - `STRIPE_WEBHOOK_SECRET` - the server's webhook secret, for signed events

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use hmac::{Hmac, Mac};
use reqwest::{Client, Response, StatusCode};
use sha2::Sha256;
use serde_json::{Value, json};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct horse battery";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// Absolute URL for `path`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// A client that keeps cookies, so the refresh cookie survives between calls.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A signed-in test user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub phone: String,
    pub access_token: String,
}

/// Unique email and phone number for one test run.
#[must_use]
pub fn unique_identity() -> (String, String) {
    let id = Uuid::new_v4();
    let digits: String = id
        .as_u128()
        .to_string()
        .chars()
        .take(9)
        .collect();
    (format!("test-{id}@example.com"), format!("+380{digits}"))
}

/// Register a fresh customer and sign in.
pub async fn register_user(client: &Client) -> TestUser {
    let (email, phone) = unique_identity();
    let resp = client
        .post(url("/auth/register"))
        .json(&json!({
            "firstName": "Test",
            "lastName": "Customer",
            "email": email,
            "phoneNumber": phone,
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let session = login(client, &email, TEST_PASSWORD).await;
    TestUser {
        id: session["user"]["id"].as_i64().unwrap(),
        email,
        phone,
        access_token: session["accessToken"].as_str().unwrap().to_owned(),
    }
}

/// Sign in and return the login body.
pub async fn login(client: &Client, login: &str, password: &str) -> Value {
    let resp = client
        .post(url("/auth/login"))
        .json(&json!({ "login": login, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse login response")
}

/// Access token of the configured admin account.
pub async fn admin_token(client: &Client) -> String {
    let email = std::env::var("TEST_ADMIN_EMAIL").expect("TEST_ADMIN_EMAIL not set");
    let password = std::env::var("TEST_ADMIN_PASSWORD").expect("TEST_ADMIN_PASSWORD not set");
    let session = login(client, &email, &password).await;
    assert!(session["uploadToken"].is_object() || session["uploadToken"].is_null());
    session["accessToken"].as_str().unwrap().to_owned()
}

/// `{en, ua}` with the same text in both languages.
#[must_use]
pub fn both(text: &str) -> Value {
    json!({ "en": text, "ua": text })
}

/// A short unique slug.
#[must_use]
pub fn unique_slug(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
    format!("{prefix}-{suffix}")
}

/// Post a payment event signed with `STRIPE_WEBHOOK_SECRET`.
pub async fn send_signed_webhook(client: &Client, event: &Value) -> Response {
    let secret = std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET not set");
    let body = event.to_string();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{body}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    client
        .post(url("/webhook/payments"))
        .header("Stripe-Signature", format!("t={timestamp},v1={signature}"))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .expect("Failed to send webhook")
}

/// A checkout session event for `order_id`.
#[must_use]
pub fn checkout_event(kind: &str, order_id: i64) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": kind,
        "created": 1_767_225_600,
        "data": {
            "object": {
                "id": format!("cs_{}", Uuid::new_v4().simple()),
                "metadata": { "orderId": order_id.to_string() },
            },
        },
    })
}
