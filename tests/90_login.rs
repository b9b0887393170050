mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn login_returns_token_and_account_view() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({"email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD}))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].is_string());
    assert!(body["data"]["expires_in"].as_u64().unwrap() > 0);
    assert_eq!(body["data"]["account"]["email"], common::ADMIN_EMAIL);
    assert_eq!(body["data"]["account"]["admin"], true);
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let mut bodies = Vec::new();
    for payload in [
        json!({"email": common::ADMIN_EMAIL, "password": "wrong-password"}),
        json!({"email": "nobody@perks.test", "password": "wrong-password"}),
    ] {
        let res = client
            .post(format!("{}/auth/login", server.base_url))
            .json(&payload)
            .send()
            .await?;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await?;
        assert_eq!(body["code"], "unauthenticated");
        bodies.push(body["error"].clone());
    }

    // Same message either way; no account-existence oracle
    assert_eq!(bodies[0], bodies[1]);
    Ok(())
}

#[tokio::test]
async fn empty_credentials_are_invalid_argument() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({"email": "", "password": ""}))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "invalid-argument");
    Ok(())
}

#[tokio::test]
async fn whoami_requires_a_session() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "unauthenticated");
    Ok(())
}
