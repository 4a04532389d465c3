//! Transport capability.
//!
//! # Responsibilities
//! - Define the request/response values exchanged with the network
//! - Define the `Transport` trait the scheduler calls to perform a request
//! - Provide a reqwest-backed implementation for production use
//!
//! # Design Decisions
//! - The scheduler owns no socket code; transport is injected
//! - Responses are fully buffered so one response can be shared by
//!   every deduplicated subscriber
//! - Transport errors are cloneable for the same reason

pub mod http_client;

use std::future::Future;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::error::GateError;

pub use http_client::ReqwestTransport;

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Text(String),
    Binary(Bytes),
}

impl RequestBody {
    /// Body text as it participates in the dedup fingerprint.
    /// Binary bodies count as empty.
    pub fn fingerprint_text(&self) -> &str {
        match self {
            RequestBody::Text(text) => text,
            RequestBody::Binary(_) => "",
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Binary(bytes)
    }
}

/// Caller-supplied request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// A parsed request bound to the host it is scheduled against.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub host: String,
    pub options: RequestOptions,
}

impl OutboundRequest {
    /// Parse `url` and derive its host key.
    pub fn parse(url: &str, options: RequestOptions) -> Result<Self, GateError> {
        let parsed = Url::parse(url).map_err(|e| GateError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
            _ => {
                return Err(GateError::InvalidUrl {
                    url: url.to_string(),
                    reason: "url has no host".to_string(),
                })
            }
        };

        Ok(Self {
            url: parsed,
            host,
            options,
        })
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(url: Url, status: StatusCode) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// True for the statuses that signal the host is overloaded.
    pub fn is_overload(&self) -> bool {
        matches!(
            self.status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        )
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established (DNS, refused, TLS).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport gave up waiting.
    #[error("request timed out")]
    Timeout,

    /// Anything else the transport reported.
    #[error("transport error: {0}")]
    Other(String),
}

/// Performs one HTTP request.
///
/// Implementations must not retry on the caller's behalf; every call the
/// scheduler makes corresponds to exactly one admitted request.
pub trait Transport: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<FetchResponse, TransportError>> + Send;
}
