//! ETOS API clients
//!
//! [`HttpClient`] carries the connection settings shared by every API
//! version. Version-specific clients implement [`RunClient`] on top of it.

use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::params::TestRunParams;
use crate::response::{check_status, parse_response, TestRun};

/// ETOS API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V0,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V0 => "v0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test run management for one API version
#[async_trait]
pub trait RunClient: Send + Sync {
    fn version(&self) -> Version;

    async fn start_test_run(&self, params: TestRunParams) -> ClientResult<TestRun>;

    async fn stop_test_run(&self, id: &str) -> ClientResult<()>;

    async fn get_test_run(&self, id: &str) -> ClientResult<TestRun>;

    async fn list_test_runs(&self) -> ClientResult<Vec<TestRun>>;
}

/// Connection to the ETOS API server
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
    dispatch: Dispatch,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        if config.server.url.is_empty() {
            return Err(ClientError::Config(
                "server URL is not set (server.url or ETOS_SERVER_URL)".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.server.url.trim_end_matches('/').to_string(),
            token: config.server.token.clone().filter(|t| !t.is_empty()),
            http,
            dispatch: Dispatch::default(),
        })
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the status and raw body
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<(u16, Vec<u8>)> {
        let dispatch = self.dispatch.clone();
        self.send(method, path, body).with_subscriber(dispatch).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<(u16, Vec<u8>)> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Making request: {} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        tracing::debug!("Response from {}: {}", url, status);
        Ok((status, bytes.to_vec()))
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<T> {
        let (status, bytes) = self.request(method, path, body).await?;
        parse_response(status, &bytes)
    }
}

/// Client for the v0 test run API
#[derive(Debug, Clone)]
pub struct V0Client {
    http: HttpClient,
}

impl V0Client {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self::with_http(HttpClient::new(config)?))
    }

    pub fn with_http(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RunClient for V0Client {
    fn version(&self) -> Version {
        Version::V0
    }

    async fn start_test_run(&self, mut params: TestRunParams) -> ClientResult<TestRun> {
        params.apply_env_fallbacks(|key| std::env::var(key).ok());
        if params.test_suite_id.is_empty() {
            return Err(ClientError::MissingParameter("test suite"));
        }
        if params.identity.is_empty() {
            return Err(ClientError::MissingParameter("identity"));
        }

        let body = params.to_v0_body();
        self.http
            .request_json(Method::POST, "/testruns", Some(&body))
            .await
    }

    async fn stop_test_run(&self, id: &str) -> ClientResult<()> {
        let (status, bytes) = self
            .http
            .request(Method::POST, &format!("/testruns/{}/stop", id), None)
            .await?;
        check_status(status, &bytes)
    }

    async fn get_test_run(&self, id: &str) -> ClientResult<TestRun> {
        self.http
            .request_json(Method::GET, &format!("/testruns/{}", id), None)
            .await
    }

    async fn list_test_runs(&self) -> ClientResult<Vec<TestRun>> {
        self.http.request_json(Method::GET, "/testruns", None).await
    }
}
