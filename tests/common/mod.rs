#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Run against the in-memory store so the suite needs no database
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_minddrag-api"));
        cmd.env("MINDDRAG_API_PORT", port.to_string())
            .env("MINDDRAG_STORE", "memory")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
        })
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
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Small request helper carrying optional basic-auth credentials
pub struct Api {
    http: reqwest::Client,
    base: String,
    auth: Option<(String, String)>,
}

impl Api {
    pub fn anonymous(server: &TestServer) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.base_url.clone(),
            auth: None,
        }
    }

    pub fn user(server: &TestServer, username: &str, password: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.base_url.clone(),
            auth: Some((username.to_string(), password.to_string())),
        }
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((username, password)) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let builder = self.http.get(format!("{}{}", self.base, path));
        Ok(self.with_auth(builder).send().await?)
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        let builder = self.http.post(format!("{}{}", self.base, path)).json(body);
        Ok(self.with_auth(builder).send().await?)
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Response> {
        let builder = self.http.put(format!("{}{}", self.base, path)).json(body);
        Ok(self.with_auth(builder).send().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        let builder = self.http.delete(format!("{}{}", self.base, path));
        Ok(self.with_auth(builder).send().await?)
    }
}

/// Register a user and return an authenticated client for it
pub async fn register(server: &TestServer, username: &str, password: &str) -> Result<Api> {
    let res = Api::anonymous(server)
        .post(
            "/auth/register",
            &json!({ "username": username, "password": password }),
        )
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "registering {} failed with {}",
        username,
        res.status()
    );
    Ok(Api::user(server, username, password))
}

/// Unwrap the `data` field of a success envelope
pub async fn data(res: Response) -> Result<Value> {
    let body: Value = res.json().await?;
    Ok(body.get("data").cloned().unwrap_or(Value::Null))
}
