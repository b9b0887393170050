use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const ADMIN_EMAIL: &str = "admin@perks.test";
pub const ADMIN_PASSWORD: &str = "admin-pw-123";

pub struct TestServer {
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Hermetic setup: memory backend, known secret, one seeded admin
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_perks-api"));
        cmd.env("APP_ENV", "development")
            .env("PERKS_BACKEND", "memory")
            .env("PERKS_API_PORT", port.to_string())
            .env("PERKS_JWT_SECRET", "integration-test-secret")
            .env("PERKS_DEV_ADMIN_EMAIL", ADMIN_EMAIL)
            .env("PERKS_DEV_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Log in and return the session token.
pub async fn login(base_url: &str, email: &str, password: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await?;

    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());

    let body: Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("login response missing token")
}

pub async fn admin_token(base_url: &str) -> Result<String> {
    login(base_url, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Provision a vendor as the seeded admin and return its uid.
pub async fn provision_vendor(base_url: &str, name: &str, email: &str) -> Result<String> {
    let token = admin_token(base_url).await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/provision/vendor", base_url))
        .bearer_auth(&token)
        .json(&json!({"name": name, "email": email, "password": "pw123456"}))
        .send()
        .await?;

    anyhow::ensure!(res.status() == StatusCode::OK, "provision failed: {}", res.status());

    let body: Value = res.json().await?;
    body["uid"].as_str().map(str::to_string).context("provision response missing uid")
}
