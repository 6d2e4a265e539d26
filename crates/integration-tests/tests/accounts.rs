//! Account API tests: registration, login, refresh and profile.
//!
//! These tests require a running storefront with a migrated database.
//! Run with: `cargo test -p vitrina-integration-tests -- --ignored`

use reqwest::StatusCode;
use serde_json::{Value, json};

use vitrina_integration_tests::{TEST_PASSWORD, client, login, register_user, url};

#[tokio::test]
#[ignore = "requires running server and database"]
async fn test_register_login_and_profile() {
    let client = client();
    let user = register_user(&client).await;

    let me: Value = client
        .get(url("/users/me"))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], user.email.as_str());
    assert_eq!(me["isAdmin"], false);

    // Phone numbers work as a login too.
    let by_phone = login(&client, &user.phone, TEST_PASSWORD).await;
    assert!(by_phone["accessToken"].is_string());
    assert!(by_phone.get("uploadToken").is_none());
}

#[tokio::test]
#[ignore = "requires running server and database"]
async fn test_duplicate_email_conflicts() {
    let client = client();
    let user = register_user(&client).await;

    let resp = client
        .post(url("/auth/register"))
        .json(&json!({
            "firstName": "Other",
            "lastName": "Person",
            "email": user.email,
            "phoneNumber": "+380991112233",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let available: Value = client
        .get(url("/users/email-available"))
        .query(&[("email", user.email.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(available["available"], false);

    // The owner may re-submit their own address.
    let own: Value = client
        .get(url("/users/email-available"))
        .bearer_auth(&user.access_token)
        .query(&[("email", user.email.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(own["available"], true);
}

#[tokio::test]
#[ignore = "requires running server and database"]
async fn test_wrong_password_is_unauthorized() {
    let client = client();
    let user = register_user(&client).await;

    let resp = client
        .post(url("/auth/login"))
        .json(&json!({ "login": user.email, "password": "not the password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires running server and database"]
async fn test_refresh_and_logout() {
    let client = client();
    register_user(&client).await;

    // The cookie store carries the refresh cookie from login.
    let refreshed = client.post(url("/auth/refresh")).send().await.unwrap();
    assert_eq!(refreshed.status(), StatusCode::OK);
    let body: Value = refreshed.json().await.unwrap();
    assert!(body["accessToken"].is_string());

    let logout = client.post(url("/auth/logout")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = client.post(url("/auth/refresh")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires running server and database"]
async fn test_password_change_requires_current_password() {
    let client = client();
    let user = register_user(&client).await;

    let wrong = client
        .patch(url("/users/me"))
        .bearer_auth(&user.access_token)
        .json(&json!({
            "password": { "currentPassword": "guess", "newPassword": "a new long password" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

    let renamed: Value = client
        .patch(url("/users/me"))
        .bearer_auth(&user.access_token)
        .json(&json!({ "firstName": "Olena" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["firstName"], "Olena");
}
