//! Shared HTTP plumbing
//!
//! Client construction and the mapping of transport failures onto `PortError`.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use core_kernel::PortError;

/// Builds a client with the given request timeout
pub fn build_client(timeout: Duration) -> Result<Client, PortError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PortError::Internal {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Maps a non-success status to a port error
pub fn status_error(status: StatusCode, service: &str, retry_after: Option<u64>) -> PortError {
    match status {
        StatusCode::NOT_FOUND => PortError::not_found(service, "requested resource"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized {
            message: format!("{service} rejected the credentials ({status})"),
        },
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        s if s.is_server_error() => PortError::unavailable(format!("{service} returned {s}")),
        s => PortError::validation(format!("{service} rejected the request ({s})")),
    }
}

/// Maps a transport-level failure to a port error
pub fn transport_error(error: reqwest::Error, service: &str, timeout: Duration) -> PortError {
    if error.is_timeout() {
        PortError::timeout(service, timeout.as_millis() as u64)
    } else if error.is_decode() {
        PortError::transformation(format!("{service} returned an undecodable body: {error}"))
    } else {
        PortError::Connection {
            message: format!("{service} is unreachable"),
            source: Some(Box::new(error)),
        }
    }
}

/// Sends a request and turns every non-success outcome into a port error
pub async fn send(request: RequestBuilder, service: &str, timeout: Duration) -> Result<Response, PortError> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, service, timeout))?;

    let status = response.status();
    debug!(service, status = status.as_u16(), "HTTP response");
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    Err(status_error(status, service, retry_after))
}

/// Decodes a JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response, service: &str) -> Result<T, PortError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| PortError::transformation(format!("{service} body could not be read: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PortError::transformation(format!("{service} returned unexpected JSON: {e}")))
}
