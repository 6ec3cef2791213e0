//! Transport for sending Omaha requests to the update service.
//!
//! Each call is one HTTP POST with an XML body; connection reuse is left to
//! the underlying `reqwest` pool.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::errors::ProtocolError;
use crate::protocol::{decode_response, encode_request, Request, Response};

/// Path of the update endpoint under the server base URL
pub const UPDATE_PATH: &str = "/v1/update/";

/// Sends one request and returns the decoded response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, ProtocolError>;
}

/// HTTP transport posting `text/xml` to `{server}/v1/update/`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared HTTP client
    client: reqwest::Client,
    /// Full update endpoint URL
    endpoint: String,
    /// Log every request/response pair
    verbose: bool,
}

impl HttpTransport {
    /// Create a transport for the given server base URL
    ///
    /// # Arguments
    /// * `server` - Base URL (e.g., "http://localhost:8000")
    /// * `timeout` - Timeout for a single request/response exchange
    /// * `verbose` - Dump every request and response body at INFO level
    pub fn new(server: &str, timeout: Duration, verbose: bool) -> Result<Self, ProtocolError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("updatectl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let endpoint = Self::endpoint_for(server);
        debug!(endpoint = %endpoint, verbose, "Created Omaha HTTP transport");

        Ok(Self {
            client,
            endpoint,
            verbose,
        })
    }

    /// Update endpoint URL this transport posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn endpoint_for(server: &str) -> String {
        format!("{}{}", server.trim().trim_end_matches('/'), UPDATE_PATH)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<Response, ProtocolError> {
        let body = encode_request(request)?;

        trace!(
            client_id = %request.app.machine_id,
            endpoint = %self.endpoint,
            event = ?request.event(),
            update_check = request.is_update_check(),
            ping = request.is_ping(),
            "Sending Omaha request"
        );

        if self.verbose {
            info!(client_id = %request.app.machine_id, "request: {}", body);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProtocolError::ConnectionFailed(e.to_string())
                } else {
                    ProtocolError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            if self.verbose {
                let text = response.text().await.unwrap_or_default();
                info!(
                    client_id = %request.app.machine_id,
                    status = status.as_u16(),
                    "response: {}",
                    text
                );
            }
            return Err(ProtocolError::UnexpectedStatus {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;

        if self.verbose {
            info!(client_id = %request.app.machine_id, "response: {}", text);
        }

        decode_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for() {
        assert_eq!(
            HttpTransport::endpoint_for("http://localhost:8000"),
            "http://localhost:8000/v1/update/"
        );
        assert_eq!(
            HttpTransport::endpoint_for("https://updates.example.com/"),
            "https://updates.example.com/v1/update/"
        );
        assert_eq!(
            HttpTransport::endpoint_for(" http://10.0.0.1:8080// "),
            "http://10.0.0.1:8080/v1/update/"
        );
    }

    #[test]
    fn test_new_transport() {
        let transport =
            HttpTransport::new("http://localhost:8000", Duration::from_secs(5), false).unwrap();
        assert_eq!(transport.endpoint(), "http://localhost:8000/v1/update/");
    }
}
