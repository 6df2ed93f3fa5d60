//! HTTP client wrapper for the streaming fetch path.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use tracing::debug;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::FetchError;

/// User-Agent sent with every request (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mediafetch/{version}")
}

/// HTTP client for streaming fetches.
///
/// Created once per dispatcher and shared by every job, taking advantage of
/// connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default 30 s connect and read timeouts.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// The read timeout bounds each wait for body data, not the whole
    /// transfer, so large files are not cut off.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = base_client_builder(connect_timeout, read_timeout).build()?;
        Ok(Self { client })
    }

    /// Sends a GET request and checks the status.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`] on transport
    /// failure and [`FetchError::HttpStatus`] for a non-2xx response.
    pub(crate) async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "non-success response");
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }
}

fn base_client_builder(connect_timeout: Duration, read_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(default_user_agent())
}
