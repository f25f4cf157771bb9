use crate::config::DEFAULT_ACCEPT;
use crate::error::HttpError;
use http::{HeaderName, HeaderValue, Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that fills in default request headers
///
/// Adds `User-Agent` and `Accept` unless the request already carries them.
#[derive(Clone)]
pub struct DefaultHeadersLayer {
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl DefaultHeadersLayer {
    /// Create the layer with the given User-Agent and the standard `Accept` value
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the user agent string is not valid
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())?;
        Ok(Self {
            headers: Arc::from([
                (http::header::USER_AGENT, user_agent),
                (
                    http::header::ACCEPT,
                    HeaderValue::from_static(DEFAULT_ACCEPT),
                ),
            ]),
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// Service that fills in default request headers
#[derive(Clone)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in self.headers.iter() {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Test service that asserts on the headers it receives.
    #[derive(Clone)]
    struct CheckHeadersService {
        expected_ua: HeaderValue,
        expected_accept: HeaderValue,
    }

    impl Service<Request<Full<Bytes>>> for CheckHeadersService {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            assert_eq!(
                req.headers().get(http::header::USER_AGENT),
                Some(&self.expected_ua)
            );
            assert_eq!(
                req.headers().get(http::header::ACCEPT),
                Some(&self.expected_accept)
            );
            std::future::ready(Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap()))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder()
            .method(Method::GET)
            .uri("https://api.example.com/article")
    }

    #[tokio::test]
    async fn test_default_headers_added() {
        let check = CheckHeadersService {
            expected_ua: HeaderValue::from_static("test-agent/1.0"),
            expected_accept: HeaderValue::from_static(DEFAULT_ACCEPT),
        };

        let layer = DefaultHeadersLayer::try_new("test-agent/1.0").unwrap();
        let mut service = layer.layer(check);

        let req = request().body(Full::new(Bytes::new())).unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_caller_headers_not_overwritten() {
        let check = CheckHeadersService {
            expected_ua: HeaderValue::from_static("custom-agent/2.0"),
            expected_accept: HeaderValue::from_static("text/html"),
        };

        let layer = DefaultHeadersLayer::try_new("test-agent/1.0").unwrap();
        let mut service = layer.layer(check);

        let req = request()
            .header(http::header::USER_AGENT, "custom-agent/2.0")
            .header(http::header::ACCEPT, "text/html")
            .body(Full::new(Bytes::new()))
            .unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        // Control characters are invalid in header values
        let result = DefaultHeadersLayer::try_new("invalid\x00agent");
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }
}
