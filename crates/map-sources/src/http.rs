//! Shared HTTP client setup and error mapping for the provider clients.

use std::time::Duration;

use bytes::Bytes;
use map_common::{MapError, MapResult};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

/// HTTP settings shared by every provider client.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Sent with every request; Nominatim and Overpass reject anonymous clients
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("streetmap/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build a client with bounded timeouts.
    pub fn build_client(&self, provider: &str) -> MapResult<Client> {
        Client::builder()
            .timeout(self.request_timeout())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                MapError::data_source(provider, "client setup", format!("failed to create HTTP client: {}", e))
            })
    }
}

/// Translate a transport error, calling out timeouts explicitly.
pub fn transport_error(provider: &str, call: &str, err: reqwest::Error) -> MapError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("provider unreachable: {}", err)
    } else if err.is_decode() {
        format!("malformed response body: {}", err)
    } else {
        err.to_string()
    };
    MapError::data_source(provider, call, message)
}

/// Send a request and return the body of a successful response.
pub async fn send_for_bytes(provider: &str, call: &str, request: RequestBuilder) -> MapResult<Bytes> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, call, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MapError::data_source(
            provider,
            call,
            format!("HTTP status {}", status),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, call, e))?;

    debug!(provider, call, size = body.len(), "Received response");
    Ok(body)
}

/// Send a request and decode a JSON body.
pub async fn send_for_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    call: &str,
    request: RequestBuilder,
) -> MapResult<T> {
    let body = send_for_bytes(provider, call, request).await?;
    decode_json(provider, call, &body)
}

/// Decode a JSON payload, reporting failures as malformed provider data.
pub fn decode_json<T: serde::de::DeserializeOwned>(provider: &str, call: &str, body: &[u8]) -> MapResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        MapError::data_source(provider, call, format!("malformed JSON response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(180));
        assert!(config.user_agent.starts_with("streetmap/"));
    }

    #[test]
    fn test_decode_json_reports_data_source() {
        let err = decode_json::<serde_json::Value>("overpass", "fetch highway", b"<html>busy</html>")
            .unwrap_err();
        assert_eq!(err.kind(), "data_source");
        assert!(err.to_string().contains("malformed JSON"));
    }

    #[test]
    fn test_build_client() {
        assert!(HttpConfig::default().build_client("test").is_ok());
    }
}
