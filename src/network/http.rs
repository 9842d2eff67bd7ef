//! HTTP handler turning requests into recorded responses

use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error};

use crate::replay::ReplayEngine;
use crate::storage::CachedArtifact;
use crate::{ApiReplayError, Result};

/// HTTP handler for the replay server
#[derive(Clone)]
pub struct HttpHandler {
    engine: Arc<ReplayEngine>,
}

impl HttpHandler {
    /// Create a handler serving from `engine`
    #[must_use]
    pub fn new(engine: Arc<ReplayEngine>) -> Self {
        Self { engine }
    }

    /// Answer one request
    ///
    /// The path and the raw query string are the lookup key; only `GET` is
    /// routed.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>> {
        if request.method() != Method::GET {
            debug!("Rejecting {} {}", request.method(), request.uri());
            let mut response = Self::create_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Error: only GET is supported",
            );
            response
                .headers_mut()
                .insert(ALLOW, hyper::header::HeaderValue::from_static("GET"));
            return response;
        }

        let path = request.uri().path();
        let query = request.uri().query().unwrap_or_default();

        self.engine
            .replay(path, query)
            .await
            .and_then(|artifact| Self::artifact_response(&artifact))
            .unwrap_or_else(|e| Self::error_response(&e))
    }

    /// Reproduce a recorded response
    ///
    /// Every header is written with all of its values in recorded order, then
    /// the status, then the body bytes unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactCorrupt` if a recorded header or status is not valid HTTP
    pub fn artifact_response(artifact: &CachedArtifact) -> Result<Response<Full<Bytes>>> {
        let mut builder = Response::builder();

        for (name, values) in artifact.headers.iter() {
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }

        builder
            .status(artifact.status)
            .body(Full::new(artifact.body.clone()))
            .map_err(|e| ApiReplayError::ArtifactCorrupt {
                path: "<recorded response>".to_string(),
                reason: e.to_string(),
            })
    }

    /// Create a simple plain-text response
    ///
    /// # Panics
    ///
    /// Panics if response builder fails (should never happen with a valid status)
    #[must_use]
    pub fn create_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(body.to_string())))
            .expect("Failed to build response")
    }

    /// Create an error response
    ///
    /// A missing route is a 404; a route whose artifact cannot be served is a 500.
    #[must_use]
    pub fn error_response(error: &ApiReplayError) -> Response<Full<Bytes>> {
        let status = if error.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            error!("Serving error: {}", error);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self::create_response(status, &format!("Error: {error}"))
    }
}
