/*
[INPUT]:  HTTP configuration (API base URL, timeouts)
[OUTPUT]: Configured reqwest client ready for queue service calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::http::{OrchestraError, Result};
use crate::types::extract_error_message;

/// Default API path below the page origin
pub const DEFAULT_API_PATH: &str = "/api/v1/";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the queue service REST API
#[derive(Debug, Clone)]
pub struct OrchestraClient {
    http_client: Client,
    api_base_url: Url,
}

impl OrchestraClient {
    /// Create a new client with default configuration
    pub fn new(api_base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig::default(), api_base_url)
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig, api_base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| OrchestraError::Config(err.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: with_trailing_slash(Url::parse(api_base_url)?),
        })
    }

    /// Create a client whose API base is `api_path` below a page origin
    pub fn for_origin(config: ClientConfig, origin: &Url, api_path: &str) -> Result<Self> {
        let base = api_base_url(origin, api_path)?;
        Self::with_config(config, base.as_str())
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// Build full URL for an API endpoint (relative, no leading slash)
    fn api_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.api_base_url.join(endpoint.trim_start_matches('/'))?)
    }

    /// Build request builder for an API endpoint
    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.api_url(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send a request and decode a JSON success body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<T> {
        let response = self.send_checked(builder, fallback).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a request whose success body is not needed
    pub(crate) async fn send_unit(&self, builder: RequestBuilder, fallback: &str) -> Result<()> {
        self.send_checked(builder, fallback).await.map(|_| ())
    }

    async fn send_checked(&self, builder: RequestBuilder, fallback: &str) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body).unwrap_or_else(|| fallback.to_string());
        debug!(status = status.as_u16(), %message, "queue service returned failure");
        Err(OrchestraError::server_error(status, message))
    }
}

/// Join `api_path` onto a page origin, keeping a trailing slash so relative
/// endpoints resolve below it.
pub fn api_base_url(origin: &Url, api_path: &str) -> Result<Url> {
    Ok(with_trailing_slash(origin.join(api_path)?))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
