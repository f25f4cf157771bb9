//! Limits applied when response data ends up in errors and logs.

/// Maximum body preview size for error messages (8KB).
///
/// Non-2xx bodies are copied into `HttpError::HttpStatus` for diagnostics;
/// only this many bytes are kept.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;
