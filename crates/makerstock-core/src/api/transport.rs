//! HTTP transport used by the API client.
//!
//! The client only needs two request shapes: a plain GET and a POST with a
//! `text/plain` body. Keeping them behind a trait lets tests script backend
//! responses without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use tracing::debug;

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status and raw body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: Url) -> Result<HttpResponse, ApiError>;

    /// POST `body` as `text/plain`. The scripted backend host rejects the
    /// cross-origin preflight that `application/json` would trigger.
    async fn post_text(&self, url: Url, body: String) -> Result<HttpResponse, ApiError>;
}

/// Transport backed by `reqwest`. Errors are stripped of their URL since
/// spreadsheet requests carry the API key in the query string.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    async fn finish(response: reqwest::Response) -> Result<HttpResponse, ApiError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        debug!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse, ApiError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        Self::finish(response).await
    }

    async fn post_text(&self, url: Url, body: String) -> Result<HttpResponse, ApiError> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        Self::finish(response).await
    }
}
