use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use thiserror::Error;

/// Fallback error code used when neither the server body nor the transport supplies one.
pub const BAD_REQUEST: u16 = 400;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Transport-level error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request timed out
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error (network, connection, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// HTTP non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form URL encoding error
    #[error("Form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// Too many requests in flight (buffer full, fail-fast)
    #[error("Service overloaded: request buffer is full")]
    Overloaded,

    /// Internal service failure (buffer worker died, channel closed)
    #[error("Service unavailable: internal failure")]
    ServiceClosed,

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching; `reason` is for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// Short variant name, used as the `name` of normalized errors
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            HttpError::RequestBuild(_) => "RequestBuild",
            HttpError::InvalidHeaderName(_) => "InvalidHeaderName",
            HttpError::InvalidHeaderValue(_) => "InvalidHeaderValue",
            HttpError::Timeout(_) => "Timeout",
            HttpError::Transport(_) => "Transport",
            HttpError::Tls(_) => "Tls",
            HttpError::BodyTooLarge { .. } => "BodyTooLarge",
            HttpError::HttpStatus { .. } => "HttpStatus",
            HttpError::Json(_) => "Json",
            HttpError::FormEncode(_) => "FormEncode",
            HttpError::Overloaded => "Overloaded",
            HttpError::ServiceClosed => "ServiceClosed",
            HttpError::InvalidUri { .. } => "InvalidUri",
            HttpError::InvalidScheme { .. } => "InvalidScheme",
        }
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

/// Code carried by a [`GatewayError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// `code` field of the server's error body
    Application(String),
    /// Transport HTTP status of the response
    Status(StatusCode),
    /// Nothing better was available, see [`BAD_REQUEST`]
    BadRequest,
}

impl ErrorCode {
    /// Numeric form, when the code has one
    #[must_use]
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            ErrorCode::Application(code) => code.parse().ok(),
            ErrorCode::Status(status) => Some(status.as_u16()),
            ErrorCode::BadRequest => Some(BAD_REQUEST),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Application(code) => f.write_str(code),
            ErrorCode::Status(status) => write!(f, "{}", status.as_u16()),
            ErrorCode::BadRequest => write!(f, "{BAD_REQUEST}"),
        }
    }
}

/// The outgoing request as the caller configured it.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub base_url: String,
    /// URL as given by the caller (usually relative to `base_url`)
    pub url: String,
    /// Final URL the request was sent to, once resolved
    pub full_url: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Outgoing payload, lossily decoded as UTF-8
    pub data: Option<String>,
}

/// The response that accompanied a failure.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Body parsed as JSON, if it was JSON
    pub json: Option<serde_json::Value>,
}

impl ResponseSnapshot {
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Normalized error returned by every failed gateway call.
///
/// Transport failures, non-2xx responses and error envelopes all end up here.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct GatewayError {
    /// `"<server message or 'Error'>: <detail>"`
    pub message: String,
    pub code: ErrorCode,
    /// Transport status, when a response was received
    pub status: Option<StatusCode>,
    pub request: RequestSnapshot,
    pub response: Option<ResponseSnapshot>,
    /// Underlying transport failure; `None` for error envelopes
    #[source]
    pub transport: Option<HttpError>,
}

impl GatewayError {
    /// `"Envelope"` for error envelopes, otherwise the transport error variant
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.transport.as_ref().map_or("Envelope", HttpError::name)
    }

    /// Parsed JSON body of the failed response, if any
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.response.as_ref().and_then(|r| r.json.as_ref())
    }
}
