use cookie_store::CookieStore;
use http::{HeaderMap, HeaderValue, Request, Response};
use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use url::Url;

/// In-memory cookie store shared by every clone of the client.
///
/// Cookies are scoped to the host, domain and path that set them; `Secure`
/// cookies are only sent over HTTPS and expired ones are dropped.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    store: Arc<RwLock<CookieStore>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every `Set-Cookie` header of a response to `url`.
    ///
    /// Unparsable headers are skipped. A cookie that is already expired
    /// (`Max-Age<=0` or `Expires` in the past) removes the stored one.
    pub fn store_from(&self, headers: &HeaderMap, url: &Url) {
        let cookies = headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .filter_map(parse_set_cookie);
        self.store.write().store_response_cookies(cookies, url);
    }

    /// `Cookie` header value for a request to `url`, `None` when nothing matches
    #[must_use]
    pub fn header_value(&self, url: &Url) -> Option<HeaderValue> {
        let joined = self
            .store
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if joined.is_empty() {
            return None;
        }
        HeaderValue::from_str(&joined).ok()
    }

    /// Value of the cookie `name` that would be sent to `url`
    #[must_use]
    pub fn get(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        self.store
            .read()
            .matches(&url)
            .into_iter()
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_owned())
    }

    /// Number of unexpired cookies, across all hosts
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().iter_unexpired().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.store.write().clear();
    }
}

fn parse_set_cookie(value: &HeaderValue) -> Option<cookie::Cookie<'static>> {
    let value = value.to_str().ok()?;
    cookie::Cookie::parse(value).ok().map(cookie::Cookie::into_owned)
}

/// Absolute URL of a request, `None` for relative request targets
fn request_url<B>(req: &Request<B>) -> Option<Url> {
    req.uri().scheme()?;
    Url::parse(&req.uri().to_string()).ok()
}

/// Tower layer that forwards credentials (cookies) on every request
#[derive(Clone, Debug, Default)]
pub struct CredentialsLayer {
    jar: CookieJar,
}

impl CredentialsLayer {
    #[must_use]
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }
}

impl<S> Layer<S> for CredentialsLayer {
    type Service = CredentialsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CredentialsService {
            inner,
            jar: self.jar.clone(),
        }
    }
}

/// Service that attaches stored cookies and records `Set-Cookie` responses
#[derive(Clone, Debug)]
pub struct CredentialsService<S> {
    inner: S,
    jar: CookieJar,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CredentialsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let url = request_url(&req);

        // Caller-supplied Cookie header wins
        if let Some(url) = &url
            && !req.headers().contains_key(http::header::COOKIE)
            && let Some(cookie) = self.jar.header_value(url)
        {
            req.headers_mut().insert(http::header::COOKIE, cookie);
        }

        let jar = self.jar.clone();
        let future = self.inner.call(req);
        Box::pin(async move {
            let response = future.await?;
            if let Some(url) = &url {
                jar.store_from(response.headers(), url);
            }
            Ok(response)
        })
    }
}
