//! HTTP transport seam.
//!
//! [`GitHubFetcher`](crate::GitHubFetcher) owns all retry and backoff policy,
//! so a transport performs exactly one request per call and reports what
//! happened without interpreting the status code.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Raw response handed back by a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    /// Builds a response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns a header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Failure to obtain any response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Error raised by `reqwest` (connect, timeout, body read).
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    /// Error raised by a non-reqwest transport.
    #[error("{0}")]
    Other(String),
}

/// Issues a single GET request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing client, e.g. one with a proxy configured.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.http.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TransportResponse;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = TransportResponse::new(200, "[]").with_header("X-RateLimit-Remaining", "42");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("42"));
    }

    #[test]
    fn invalid_header_is_skipped() {
        let response = TransportResponse::new(200, "").with_header("bad header", "x");
        assert!(response.headers.is_empty());
    }
}
