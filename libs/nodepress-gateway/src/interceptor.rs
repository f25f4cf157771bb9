//! Response interceptors: unwrap success envelopes, normalize everything else.

use crate::config::ExecutionContext;
use crate::envelope::{Payload, field_text, is_success};
use crate::error::{ErrorCode, GatewayError, HttpError, RequestSnapshot, ResponseSnapshot};
use crate::response::{HttpResponse, body_preview, content_type};
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Message prefix used when the server did not supply one
const DEFAULT_MESSAGE: &str = "Error";

/// A call that did not produce a payload, before normalization.
#[derive(Debug)]
pub enum Rejection {
    /// Transport failure or non-2xx status
    Transport {
        error: HttpError,
        response: Option<ResponseSnapshot>,
    },
    /// 2xx JSON response whose envelope status is not `success`
    Envelope { response: ResponseSnapshot },
}

impl From<HttpError> for Rejection {
    fn from(error: HttpError) -> Self {
        Rejection::Transport {
            error,
            response: None,
        }
    }
}

/// Success interceptor.
///
/// JSON responses must carry a success envelope and resolve to its `result`;
/// other responses resolve to their raw body.
pub async fn on_fulfilled<T: DeserializeOwned>(
    response: HttpResponse,
) -> Result<Payload<T>, Rejection> {
    let status = response.status();
    let headers = response.headers().clone();
    let is_json = response.is_json();

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(error) => {
            return Err(Rejection::Transport {
                error,
                response: Some(ResponseSnapshot {
                    status,
                    headers,
                    body: Bytes::new(),
                    json: None,
                }),
            });
        }
    };

    if !status.is_success() {
        let error = HttpError::HttpStatus {
            status,
            body_preview: body_preview(&body),
            content_type: content_type(&headers).map(String::from),
        };
        // Error bodies are parsed whatever their content type
        let json = serde_json::from_slice(&body).ok();
        return Err(Rejection::Transport {
            error,
            response: Some(ResponseSnapshot {
                status,
                headers,
                body,
                json,
            }),
        });
    }

    if !is_json {
        return Ok(Payload::Raw(body));
    }

    // HEAD and 204 responses may declare JSON without sending any
    if body.is_empty() {
        return Ok(Payload::Raw(Bytes::new()));
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return Err(Rejection::Transport {
                error: HttpError::Json(e),
                response: Some(ResponseSnapshot {
                    status,
                    headers,
                    body,
                    json: None,
                }),
            });
        }
    };

    if !is_success(&value) {
        return Err(Rejection::Envelope {
            response: ResponseSnapshot {
                status,
                headers,
                body,
                json: Some(value),
            },
        });
    }

    let null = Value::Null;
    let decoded = T::deserialize(value.get("result").unwrap_or(&null));
    match decoded {
        Ok(result) => Ok(Payload::Result(result)),
        Err(e) => Err(Rejection::Transport {
            error: HttpError::Json(e),
            response: Some(ResponseSnapshot {
                status,
                headers,
                body,
                json: Some(value),
            }),
        }),
    }
}

/// Failure interceptor: build the normalized error and log it once.
pub fn on_rejected(
    rejection: Rejection,
    request: RequestSnapshot,
    context: ExecutionContext,
) -> GatewayError {
    let error = normalize(rejection, request);
    log_failure(&error, context);
    error
}

fn normalize(rejection: Rejection, request: RequestSnapshot) -> GatewayError {
    let (transport, response) = match rejection {
        Rejection::Transport { error, response } => (Some(error), response),
        Rejection::Envelope { response } => (None, Some(response)),
    };

    let body = response.as_ref().and_then(|r| r.json.as_ref());
    let status = response.as_ref().map(|r| r.status);

    let code = field_text(body, "code")
        .map(ErrorCode::Application)
        .or(status.map(ErrorCode::Status))
        .unwrap_or(ErrorCode::BadRequest);

    let message_text = field_text(body, "message").unwrap_or_else(|| DEFAULT_MESSAGE.to_owned());
    let error_text = field_text(body, "error")
        .or_else(|| {
            status
                .and_then(|s| s.canonical_reason())
                .map(str::to_owned)
        })
        .or_else(|| transport.as_ref().map(ToString::to_string))
        .unwrap_or_else(|| status.map_or_else(String::new, |s| s.as_u16().to_string()));

    GatewayError {
        message: format!("{message_text}: {error_text}"),
        code,
        status,
        request,
        response,
        transport,
    }
}

/// Reduced view of a [`GatewayError`] for server-side logs.
///
/// Leaves out the response and transport objects, which can be large.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSummary<'a> {
    pub name: &'static str,
    pub message: &'a str,
    pub status: Option<StatusCode>,
    pub code: &'a ErrorCode,
    pub method: &'a http::Method,
    pub base_url: &'a str,
    pub url: &'a str,
    pub data: Option<&'a str>,
    pub headers: &'a [(String, String)],
}

impl GatewayError {
    #[must_use]
    pub fn summary(&self) -> DiagnosticSummary<'_> {
        DiagnosticSummary {
            name: self.name(),
            message: &self.message,
            status: self.status,
            code: &self.code,
            method: &self.request.method,
            base_url: &self.request.base_url,
            url: &self.request.url,
            data: self.request.data.as_deref(),
            headers: &self.request.headers,
        }
    }
}

fn log_failure(error: &GatewayError, context: ExecutionContext) {
    match context {
        ExecutionContext::Client => {
            tracing::debug!(error = ?error, "gateway request failed");
        }
        ExecutionContext::Server => {
            let summary = error.summary();
            tracing::debug!(
                name = summary.name,
                message = %summary.message,
                status = ?summary.status,
                code = %summary.code,
                method = %summary.method,
                base_url = %summary.base_url,
                url = %summary.url,
                data = ?summary.data,
                headers = ?summary.headers,
                "gateway request failed"
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::response::ResponseBody;
    use http::{HeaderMap, Method, Response};
    use http_body_util::{BodyExt, Full};
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn response(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
        response_bytes(status, content_type, Bytes::from(body.to_owned()))
    }

    fn response_bytes(status: u16, content_type: Option<&str>, body: Bytes) -> HttpResponse {
        let mut builder = Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        let body: ResponseBody = Full::new(body)
            .map_err(|never| match never {})
            .boxed();
        HttpResponse {
            inner: builder.body(body).unwrap(),
            max_body_size: 1024 * 1024,
        }
    }

    fn request() -> RequestSnapshot {
        RequestSnapshot {
            method: Method::POST,
            base_url: "https://api.example.com".to_owned(),
            url: "/comment".to_owned(),
            full_url: Some("https://api.example.com/comment".to_owned()),
            headers: vec![("x-token".to_owned(), "abc".to_owned())],
            data: Some(r#"{"content":"hi"}"#.to_owned()),
        }
    }

    fn snapshot(status: StatusCode, json: Option<Value>) -> ResponseSnapshot {
        ResponseSnapshot {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            json,
        }
    }

    #[tokio::test]
    async fn test_success_envelope_resolves_to_result() {
        let resp = response(
            200,
            Some("application/json; charset=utf-8"),
            r#"{"status":"success","message":"ok","result":{"id":1}}"#,
        );
        let payload: Payload = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload, Payload::Result(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_success_envelope_typed_result() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Article {
            id: u32,
            title: String,
        }

        let resp = response(
            200,
            Some("application/json"),
            r#"{"status":"success","message":"ok","result":{"id":3,"title":"hello"}}"#,
        );
        let payload: Payload<Article> = on_fulfilled(resp).await.unwrap();
        assert_eq!(
            payload.into_result(),
            Some(Article {
                id: 3,
                title: "hello".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_result_decodes_as_null() {
        let resp = response(200, Some("application/json"), r#"{"status":"success"}"#);
        let payload: Payload<Option<u32>> = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload, Payload::Result(None));
    }

    #[tokio::test]
    async fn test_error_envelope_is_rejected() {
        let resp = response(
            200,
            Some("application/json"),
            r#"{"status":"error","message":"Invalid","error":"bad id"}"#,
        );
        let rejection = on_fulfilled::<Value>(resp).await.unwrap_err();
        let Rejection::Envelope { response } = rejection else {
            panic!("expected an envelope rejection");
        };
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json.unwrap()["error"], "bad id");
    }

    #[tokio::test]
    async fn test_non_json_resolves_to_raw_body() {
        let resp = response(200, Some("text/html"), "<html><body>hi</body></html>");
        let payload: Payload = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload.raw_str(), Some("<html><body>hi</body></html>"));
    }

    #[tokio::test]
    async fn test_binary_body_resolves_byte_for_byte() {
        let png = Bytes::from_static(&[137, 80, 78, 71, 255, 254]);
        let resp = response_bytes(200, Some("image/png"), png.clone());
        let payload: Payload = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload, Payload::Raw(png));
    }

    #[tokio::test]
    async fn test_missing_content_type_resolves_to_raw_body() {
        let resp = response(200, None, r#"{"status":"error"}"#);
        let payload: Payload = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload.raw_str(), Some(r#"{"status":"error"}"#));
    }

    #[tokio::test]
    async fn test_empty_json_body_resolves_to_empty_raw() {
        let resp = response(200, Some("application/json"), "");
        let payload: Payload = on_fulfilled(resp).await.unwrap();
        assert_eq!(payload, Payload::Raw(Bytes::new()));
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let resp = response(200, Some("application/json"), "{not json");
        let rejection = on_fulfilled::<Value>(resp).await.unwrap_err();
        assert!(matches!(
            rejection,
            Rejection::Transport {
                error: HttpError::Json(_),
                response: Some(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_result_type_mismatch_is_rejected() {
        let resp = response(
            200,
            Some("application/json"),
            r#"{"status":"success","result":"not a number"}"#,
        );
        let rejection = on_fulfilled::<u32>(resp).await.unwrap_err();
        assert!(matches!(
            rejection,
            Rejection::Transport {
                error: HttpError::Json(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_2xx_keeps_parsed_body() {
        let resp = response(
            403,
            Some("text/plain"),
            r#"{"status":"error","message":"Forbidden","error":"no token"}"#,
        );
        let rejection = on_fulfilled::<Value>(resp).await.unwrap_err();
        let Rejection::Transport {
            error: HttpError::HttpStatus { status, .. },
            response: Some(response),
        } = rejection
        else {
            panic!("expected an HTTP status rejection with a response");
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(response.json.unwrap()["error"], "no token");
    }

    #[test]
    fn test_normalize_envelope_message_and_code() {
        let rejection = Rejection::Envelope {
            response: snapshot(
                StatusCode::OK,
                Some(json!({"status": "error", "message": "Invalid", "error": "bad id"})),
            ),
        };
        let err = normalize(rejection, request());
        assert_eq!(err.message, "Invalid: bad id");
        assert_eq!(err.code, ErrorCode::Status(StatusCode::OK));
        assert!(err.transport.is_none());
    }

    #[test]
    fn test_normalize_prefers_application_code() {
        let rejection = Rejection::Transport {
            error: HttpError::HttpStatus {
                status: StatusCode::UNAUTHORIZED,
                body_preview: String::new(),
                content_type: None,
            },
            response: Some(snapshot(
                StatusCode::UNAUTHORIZED,
                Some(json!({"code": 10401, "message": "Unauthorized"})),
            )),
        };
        let err = normalize(rejection, request());
        assert_eq!(err.code, ErrorCode::Application("10401".to_owned()));
        assert_eq!(err.message, "Unauthorized: Unauthorized");
        assert_eq!(err.status, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_normalize_status_without_body() {
        let rejection = Rejection::Transport {
            error: HttpError::HttpStatus {
                status: StatusCode::BAD_GATEWAY,
                body_preview: "<html>".to_owned(),
                content_type: Some("text/html".to_owned()),
            },
            response: Some(snapshot(StatusCode::BAD_GATEWAY, None)),
        };
        let err = normalize(rejection, request());
        assert_eq!(err.code, ErrorCode::Status(StatusCode::BAD_GATEWAY));
        assert_eq!(err.message, "Error: Bad Gateway");
    }

    #[test]
    fn test_normalize_transport_failure_without_response() {
        let rejection = Rejection::from(HttpError::Timeout(std::time::Duration::from_secs(2)));
        let err = normalize(rejection, request());
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(err.status, None);
        assert!(err.message.starts_with("Error: "));
        assert!(err.message.ends_with("Request timed out after 2s"));
    }

    #[test]
    fn test_summary_fields() {
        let err = normalize(
            Rejection::Envelope {
                response: snapshot(StatusCode::OK, Some(json!({"message": "Nope"}))),
            },
            request(),
        );
        let summary = err.summary();
        assert_eq!(summary.name, "Envelope");
        assert_eq!(summary.message, "Nope: OK");
        assert_eq!(*summary.method, Method::POST);
        assert_eq!(summary.base_url, "https://api.example.com");
        assert_eq!(summary.url, "/comment");
        assert_eq!(summary.data, Some(r#"{"content":"hi"}"#));
        assert_eq!(summary.headers.len(), 1);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(context: ExecutionContext) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let rejection = Rejection::Envelope {
                response: snapshot(
                    StatusCode::OK,
                    Some(json!({"message": "Invalid", "error": "bad id"})),
                ),
            };
            on_rejected(rejection, request(), context);
        });

        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_server_context_logs_summary_only() {
        let output = logged(ExecutionContext::Server);
        assert_eq!(output.matches("gateway request failed").count(), 1);
        assert!(output.contains("base_url=https://api.example.com"));
        assert!(output.contains("method=POST"));
        assert!(!output.contains("ResponseSnapshot"));
    }

    #[test]
    fn test_client_context_logs_full_error() {
        let output = logged(ExecutionContext::Client);
        assert_eq!(output.matches("gateway request failed").count(), 1);
        assert!(output.contains("ResponseSnapshot"));
        assert!(output.contains("Invalid: bad id"));
    }
}
