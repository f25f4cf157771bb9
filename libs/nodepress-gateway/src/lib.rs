#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP gateway for the `NodePress` API
//!
//! A single shared client bound to the API base URL, with two response
//! interceptors in front of it:
//! - **Success**: JSON responses carry a `{ status, message, result }`
//!   envelope; `status == "success"` resolves to `result`, anything else is
//!   a failure. Non-JSON bodies resolve unmodified.
//! - **Failure**: network errors, non-2xx statuses and error envelopes all
//!   become a [`GatewayError`] with a `code` and a composed `message`, and
//!   are logged once through `tracing`.
//!
//! The transport underneath is a hyper/rustls client behind a tower stack
//! (default headers, cookie forwarding, decompression, redirects), usable
//! on its own as [`HttpClient`].
//!
//! # Example
//!
//! ```ignore
//! use nodepress_gateway::{Gateway, GatewayConfig};
//!
//! let gateway = Gateway::new(&GatewayConfig::new("https://api.example.com"))?;
//!
//! let article: Article = gateway
//!     .get("/article/42")
//!     .send_as()
//!     .await?
//!     .into_result()
//!     .unwrap_or_default();
//!
//! gateway
//!     .post("/comment")
//!     .json(&new_comment)
//!     .send()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod envelope;
mod error;
mod gateway;
pub mod global;
mod interceptor;
mod layers;
mod request;
mod response;
pub mod security;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    ConfigError, DEFAULT_ACCEPT, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT, ENV_PREFIX,
    ExecutionContext, GatewayConfig, HttpClientConfig, TlsRootConfig, TransportSecurity,
};
pub use envelope::{Envelope, EnvelopeStatus, Payload, field_text, is_success};
pub use error::{
    BAD_REQUEST, ErrorCode, GatewayError, HttpError, InvalidUriKind, RequestSnapshot,
    ResponseSnapshot,
};
pub use gateway::{Gateway, GatewayRequest, RequestConfig, RequestData};
pub use interceptor::DiagnosticSummary;
pub use layers::{
    CookieJar, CredentialsLayer, CredentialsService, DefaultHeadersLayer, DefaultHeadersService,
};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};
