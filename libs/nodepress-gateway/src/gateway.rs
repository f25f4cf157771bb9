use crate::builder::HttpClientBuilder;
use crate::client::HttpClient;
use crate::config::{ConfigError, ExecutionContext, GatewayConfig};
use crate::envelope::Payload;
use crate::error::{GatewayError, HttpError, RequestSnapshot};
use crate::interceptor::{self, Rejection};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Outgoing payload of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestData {
    /// Encoded JSON, sent as `application/json`
    Json(Bytes),
    /// Encoded form, sent as `application/x-www-form-urlencoded`
    Form(Bytes),
    /// Raw bytes, sent without a default content type
    Bytes(Bytes),
}

impl RequestData {
    /// Serialize `value` as a JSON payload
    ///
    /// # Errors
    /// Returns `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        Ok(RequestData::Json(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Serialize `value` as a URL-encoded form payload
    ///
    /// # Errors
    /// Returns `HttpError::FormEncode` if encoding fails.
    pub fn form<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        Ok(RequestData::Form(Bytes::from(serde_urlencoded::to_string(
            value,
        )?)))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        match self {
            RequestData::Json(b) | RequestData::Form(b) | RequestData::Bytes(b) => b,
        }
    }

    fn to_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

/// Full description of a call, for [`Gateway::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: http::Method,
    /// Path relative to the base URL, or an absolute `http(s)://` URL
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Already-encoded query string, without the leading `?`
    pub query: Option<String>,
    pub data: Option<RequestData>,
}

impl RequestConfig {
    #[must_use]
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }
}

/// The shared API client: base URL, credential policy and both response
/// interceptors in front of an [`HttpClient`].
///
/// Every call resolves to the unwrapped envelope `result` (or the raw body
/// of a non-JSON response) and every failure becomes a [`GatewayError`].
///
/// ```ignore
/// let gateway = Gateway::new(&GatewayConfig::new("https://api.example.com"))?;
/// let article = gateway.get("/article/1").send_as::<Article>().await?;
/// ```
#[derive(Clone)]
pub struct Gateway {
    http: HttpClient,
    base_url: Arc<str>,
    context: ExecutionContext,
}

impl Gateway {
    /// Validate `config` and build the transport client for it.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidBaseUrl` for an unusable base URL and
    /// `ConfigError::Client` if the transport cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = HttpClientBuilder::with_config(config.http_config()).build()?;

        tracing::debug!(
            base_url = %config.base_url,
            with_credentials = config.with_credentials,
            context = ?config.context,
            "gateway initialized"
        );

        Ok(Self::from_client(http, config.base_url.as_str(), config.context))
    }

    /// Wrap an already-built transport client.
    #[must_use]
    pub fn from_client(
        http: HttpClient,
        base_url: impl Into<Arc<str>>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            context,
        }
    }

    /// Underlying transport client, bypassing both interceptors
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn request(&self, config: RequestConfig) -> GatewayRequest {
        GatewayRequest {
            gateway: self.clone(),
            config,
            error: None,
        }
    }

    pub fn get(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::GET, url))
    }

    pub fn delete(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::DELETE, url))
    }

    pub fn head(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::HEAD, url))
    }

    pub fn options(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::OPTIONS, url))
    }

    pub fn post(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::POST, url))
    }

    pub fn put(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::PUT, url))
    }

    pub fn patch(&self, url: &str) -> GatewayRequest {
        self.request(RequestConfig::new(http::Method::PATCH, url))
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A pending gateway call.
///
/// Encoding errors are kept until [`send`](GatewayRequest::send), where they
/// are rejected through the failure interceptor like any other error.
#[must_use = "GatewayRequest does nothing until .send() is called"]
pub struct GatewayRequest {
    gateway: Gateway,
    config: RequestConfig,
    error: Option<HttpError>,
}

impl GatewayRequest {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Append query parameters; repeated calls accumulate.
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(encoded) if encoded.is_empty() => {}
            Ok(encoded) => {
                self.config.query = Some(match self.config.query.take() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
                    _ => encoded,
                });
            }
            Err(e) => self.defer(e.into()),
        }
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match RequestData::json(body) {
            Ok(data) => self.config.data = Some(data),
            Err(e) => self.defer(e),
        }
        self
    }

    pub fn form<T: Serialize + ?Sized>(mut self, fields: &T) -> Self {
        match RequestData::form(fields) {
            Ok(data) => self.config.data = Some(data),
            Err(e) => self.defer(e),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.config.data = Some(RequestData::Bytes(body.into()));
        self
    }

    pub fn data(mut self, data: RequestData) -> Self {
        self.config.data = Some(data);
        self
    }

    fn defer(&mut self, error: HttpError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Send the call and resolve to an untyped payload.
    ///
    /// # Errors
    /// Every failure is returned as a [`GatewayError`].
    pub async fn send(self) -> Result<Payload<Value>, GatewayError> {
        self.send_as::<Value>().await
    }

    /// Send the call and decode the envelope `result` into `T`.
    ///
    /// # Errors
    /// Every failure is returned as a [`GatewayError`], including a `result`
    /// that does not decode into `T`.
    pub async fn send_as<T: DeserializeOwned>(self) -> Result<Payload<T>, GatewayError> {
        let GatewayRequest {
            gateway,
            config,
            error,
        } = self;

        let full_url = resolve_url(&gateway.base_url, &config.url, config.query.as_deref());
        let snapshot = RequestSnapshot {
            method: config.method.clone(),
            base_url: gateway.base_url().to_owned(),
            url: config.url.clone(),
            full_url: Some(full_url.clone()),
            headers: config.headers.clone(),
            data: config.data.as_ref().map(RequestData::to_text),
        };

        let outcome = match error {
            Some(e) => Err(Rejection::from(e)),
            None => dispatch::<T>(&gateway.http, config, &full_url).await,
        };

        outcome.map_err(|rejection| interceptor::on_rejected(rejection, snapshot, gateway.context))
    }
}

async fn dispatch<T: DeserializeOwned>(
    http: &HttpClient,
    config: RequestConfig,
    full_url: &str,
) -> Result<Payload<T>, Rejection> {
    let mut builder = http.request(config.method, full_url).headers(config.headers);
    builder = match config.data {
        Some(RequestData::Json(b)) => builder.json_bytes(b),
        Some(RequestData::Form(b)) => builder.form_bytes(b),
        Some(RequestData::Bytes(b)) => builder.body_bytes(b),
        None => builder,
    };

    let response = builder.send().await?;
    interceptor::on_fulfilled(response).await
}

/// Join `url` onto `base_url` and append `query`.
///
/// Absolute `http(s)://` URLs are used as-is.
fn resolve_url(base_url: &str, url: &str, query: Option<&str>) -> String {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    let mut full = if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_owned()
    } else if url.is_empty() {
        base_url.to_owned()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        full.push(if full.contains('?') { '&' } else { '?' });
        full.push_str(query);
    }
    full
}
