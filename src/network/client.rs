//! HTTP client for fetching responses from the real API

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::storage::HeaderMultimap;
use crate::{ApiReplayError, Result};

use super::CONNECT_TIMEOUT_MS;

/// HTTP client for the upstream API
pub struct UpstreamClient {
    client: reqwest::Client,
    max_response_size: usize,
}

impl UpstreamClient {
    /// Create a new upstream client
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn new(max_response_size: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .build()
            .map_err(|e| ApiReplayError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_size,
        })
    }

    /// Fetch `url` with the given method and extra headers
    ///
    /// Any status is returned as-is; deciding what counts as a failure is up
    /// to the caller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` for a malformed header, `Upstream` if the
    /// request fails, `DataTooLarge` if the body exceeds the size limit
    pub async fn fetch(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
    ) -> Result<FetchedResponse> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| {
            ApiReplayError::Other(format!("Invalid HTTP method '{method}': {e}"))
        })?;

        debug!("Fetching {} {}", method, url);

        let mut response = self
            .client
            .request(method, url.clone())
            .headers(build_header_map(headers)?)
            .send()
            .await
            .map_err(|e| {
                warn!("Request failed: {e}");
                ApiReplayError::Upstream(e.to_string())
            })?;

        if let Some(length) = response.content_length() {
            self.check_size(usize::try_from(length).unwrap_or(usize::MAX))?;
        }

        let status = response.status().as_u16();

        let mut response_headers = HeaderMultimap::new();
        for name in response.headers().keys() {
            for value in response.headers().get_all(name) {
                response_headers.append(
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                );
            }
        }

        // Checked per chunk: chunked bodies have no content length
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ApiReplayError::Upstream(format!("Failed to read response body: {e}")))?
        {
            self.check_size(body.len().saturating_add(chunk.len()))?;
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedResponse {
            status,
            headers: response_headers,
            body: body.freeze(),
        })
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_response_size {
            return Err(ApiReplayError::DataTooLarge {
                size,
                limit: self.max_response_size,
            });
        }
        Ok(())
    }
}

/// Response from the upstream API
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, in received order
    pub headers: HeaderMultimap,
    /// Response body
    pub body: Bytes,
}

impl FetchedResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiReplayError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiReplayError::InvalidHeader(format!("{name}: {e}")))?;
        map.append(name, value);
    }

    Ok(map)
}
