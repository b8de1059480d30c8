//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use shelf_server::{Server, ServerConfig};
use shelf_store::{SqliteDriver, Store};

/// A test server that runs in the background against an on-disk database.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client for this server. Cookies are handled by hand.
    pub client: Client,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Holds the SQLite file.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with_config(ServerConfig::default()).await
    }

    /// Start a new test server with the given configuration.
    pub async fn start_with_config(config: ServerConfig) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let addr = find_available_port().await?;

        let driver = SqliteDriver::open(&temp_dir.path().join("shelf.db"))?;
        let config = config.with_bind_address(addr).with_request_logging(false);
        let store = Store::new(Arc::new(driver), config.cache.clone());

        let server = Server::new(store, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Call a user service method.
    pub fn call(&self, method: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/api.v1.UserService/{}", self.base_url(), method))
    }

    /// Call a user service method presenting a session cookie.
    pub fn call_with_cookie(&self, method: &str, cookie: &str) -> reqwest::RequestBuilder {
        self.call(method).header("Cookie", cookie)
    }

    /// Register a user and return the response body.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<Value> {
        let resp = self
            .call("CreateUser")
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Sign in and return the `name=value` part of the session cookie.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .call("CreateSession")
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?
            .error_for_status()?;
        let set_cookie = set_cookie(&resp).ok_or_else(|| anyhow::anyhow!("no Set-Cookie"))?;
        Ok(cookie_pair(&set_cookie).to_string())
    }
}

/// The raw `Set-Cookie` header of a response.
pub fn set_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `name=value` from a `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default().trim()
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
