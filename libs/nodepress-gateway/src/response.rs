use crate::error::HttpError;
use crate::security::ERROR_BODY_PREVIEW_LIMIT;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Type alias for the boxed response body that supports decompression.
///
/// This type can hold either a raw body or a decompressed body (gzip/br/deflate).
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Transport response, before any envelope handling.
///
/// The gateway interceptors read it with [`HttpResponse::bytes`]. Callers of
/// `Gateway::http()` get it as is, with `json`/`text` for the usual cases.
/// Reads stop at `max_body_size` bytes of decompressed data.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// `Content-Type` header value, if present and valid UTF-8
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        content_type(self.inner.headers())
    }

    /// Whether the `Content-Type` header mentions JSON (`application/json`,
    /// `application/problem+json`, ...)
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.contains("json"))
    }

    /// Read response body as bytes without status check
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited_impl(self.inner, self.max_body_size).await
    }

    /// Parse response body as JSON with status check
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` if status is not 2xx.
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    /// Returns `HttpError::Json` if parsing fails.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body_bytes = checked_body_impl(self.inner, self.max_body_size).await?;
        let value = serde_json::from_slice(&body_bytes)?;
        Ok(value)
    }

    /// Read response body as text (UTF-8) with status check
    ///
    /// Invalid UTF-8 sequences are replaced with the Unicode replacement character.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` if status is not 2xx.
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn text(self) -> Result<String, HttpError> {
        let body_bytes = checked_body_impl(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body_bytes).into_owned())
    }
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Lossy UTF-8 preview of at most [`ERROR_BODY_PREVIEW_LIMIT`] bytes
pub fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(ERROR_BODY_PREVIEW_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

async fn checked_body_impl(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    let content_type = content_type(response.headers()).map(String::from);

    if !status.is_success() {
        // An oversized body must not hide the status error
        let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
        let body_preview = match read_body_limited_impl(response, preview_limit).await {
            Ok(bytes) => body_preview(&bytes),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return Err(e),
        };

        return Err(HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        });
    }

    read_body_limited_impl(response, max_body_size).await
}

/// Read the (possibly decompressed) body, enforcing the byte limit on
/// decompressed data.
async fn read_body_limited_impl(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let (_parts, body) = response.into_parts();

    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn response(status: u16, content_type: Option<&str>, body: &'static str) -> HttpResponse {
        let mut builder = Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never| match never {})
            .boxed();
        HttpResponse {
            inner: builder.body(body).unwrap(),
            max_body_size: 1024,
        }
    }

    #[test]
    fn test_is_json_matches_json_media_types() {
        assert!(response(200, Some("application/json"), "").is_json());
        assert!(response(200, Some("application/json; charset=utf-8"), "").is_json());
        assert!(response(200, Some("application/problem+json"), "").is_json());
        assert!(!response(200, Some("text/html"), "").is_json());
        assert!(!response(200, None, "").is_json());
    }

    #[tokio::test]
    async fn test_text_reads_body() {
        let text = response(200, Some("text/plain"), "hello").text().await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_text_reports_status_with_preview() {
        let err = response(503, Some("text/plain"), "down").text().await.unwrap_err();
        let HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        } = err
        else {
            panic!("expected an HttpStatus error");
        };
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_preview, "down");
        assert_eq!(content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_bytes_ignores_status() {
        let body = response(404, None, "missing").bytes().await.unwrap();
        assert_eq!(body, "missing");
    }

    #[test]
    fn test_body_preview_is_truncated() {
        let body = vec![b'x'; ERROR_BODY_PREVIEW_LIMIT + 100];
        assert_eq!(body_preview(&body).len(), ERROR_BODY_PREVIEW_LIMIT);
    }
}
