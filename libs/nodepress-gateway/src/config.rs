use crate::error::HttpError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default User-Agent string for gateway requests
pub const DEFAULT_USER_AGENT: &str = concat!("nodepress-gateway/", env!("CARGO_PKG_VERSION"));

/// Default `Accept` header, matching what browser-side API clients send
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Prefix for environment variables read by [`GatewayConfig::load`]
pub const ENV_PREFIX: &str = "NODEPRESS_";

/// Default number of redirects followed before giving up
pub const DEFAULT_MAX_REDIRECTS: usize = 21;

/// Which side of the application the gateway runs on.
///
/// Only affects how much of a failed call is written to the diagnostic log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Browser-like context: the full error is logged
    Client,
    /// Server-side rendering: only a reduced summary is logged
    #[default]
    Server,
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the client enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow plain HTTP connections (local API servers, mock servers in tests)
    AllowInsecureHttp,
}

/// Transport-level client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout (default: none)
    pub request_timeout: Option<Duration>,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Forward cookies: remember `Set-Cookie` and replay it on every request (default: true)
    pub with_credentials: bool,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Buffer capacity for concurrent request handling (default: 1024)
    ///
    /// Requests beyond this many in flight fail fast with `HttpError::Overloaded`.
    pub buffer_capacity: usize,

    /// Maximum number of redirects to follow; `0` disables redirect following (default: 21)
    pub max_redirects: usize,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            with_credentials: true,
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            buffer_capacity: 1024,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Create configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(10)),
            max_body_size: 1024 * 1024, // 1 MB
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }
}

/// Configuration loading and validation failures
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Figment could not extract the configuration
    #[error("Failed to load gateway configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Base URL is not an absolute `http(s)://` URL
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Transport client could not be built from the configuration
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] HttpError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Gateway configuration as read from the application config.
///
/// ```yaml
/// base_url: "https://api.example.com"
/// with_credentials: true
/// context: server
/// request_timeout: 15s
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base address every relative request path is joined onto
    pub base_url: String,
    /// Forward cookies on every request
    pub with_credentials: bool,
    /// Execution context, selects diagnostic log verbosity
    pub context: ExecutionContext,
    /// Permit `http://` base URLs
    pub allow_insecure_http: bool,
    pub tls_roots: TlsRootConfig,
    pub user_agent: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub max_body_size: usize,
    pub max_redirects: usize,
    pub buffer_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            base_url: String::new(),
            with_credentials: http.with_credentials,
            context: ExecutionContext::default(),
            allow_insecure_http: false,
            tls_roots: http.tls_roots,
            user_agent: http.user_agent,
            request_timeout: http.request_timeout,
            max_body_size: http.max_body_size,
            max_redirects: http.max_redirects,
            buffer_capacity: http.buffer_capacity,
            pool_idle_timeout: http.pool_idle_timeout,
            pool_max_idle_per_host: http.pool_max_idle_per_host,
        }
    }
}

impl GatewayConfig {
    /// Configuration with the given base URL and everything else defaulted
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Extract and validate the configuration from a prepared figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if extraction fails and
    /// `ConfigError::InvalidBaseUrl` if the base URL is unusable.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then the optional YAML file, then `NODEPRESS_*` environment variables.
    ///
    /// # Errors
    /// See [`GatewayConfig::from_figment`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(&figment)
    }

    /// Check that the base URL is absolute and allowed by the transport policy.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidBaseUrl` describing the problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.to_owned(),
        };

        let uri: http::Uri = self
            .base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        if uri.authority().is_none() {
            return Err(invalid("missing host/authority"));
        }
        match uri.scheme_str() {
            Some("https") => Ok(()),
            Some("http") => {
                if self.allow_insecure_http {
                    Ok(())
                } else {
                    Err(invalid("HTTPS required unless allow_insecure_http is set"))
                }
            }
            Some(_) => Err(invalid("only http:// and https:// schemes are supported")),
            None => Err(invalid("missing scheme")),
        }
    }

    /// Transport configuration derived from this gateway configuration
    #[must_use]
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: self.request_timeout,
            max_body_size: self.max_body_size,
            user_agent: self.user_agent.clone(),
            with_credentials: self.with_credentials,
            transport: if self.allow_insecure_http {
                TransportSecurity::AllowInsecureHttp
            } else {
                TransportSecurity::TlsOnly
            },
            tls_roots: self.tls_roots,
            buffer_capacity: self.buffer_capacity,
            max_redirects: self.max_redirects,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
        }
    }
}
