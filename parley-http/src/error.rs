use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    /// Decoder message and a snippet of the offending body.
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// Network failures, 429 and 5xx: the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network(_) => true,
            HttpError::Api { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

const SNIPPET_MAX: usize = 500;

/// Human-readable reason from an error body.
///
/// Understands `{"error":{"message":..}}` (OpenAI) and flat
/// `message`/`detail`/`error` strings; anything else is returned as a snippet.
pub(crate) fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorBody {
        Nested { error: Nested },
        Flat {
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            detail: Option<String>,
            #[serde(default)]
            error: Option<String>,
        },
    }
    #[derive(Deserialize)]
    struct Nested {
        message: String,
    }

    let found = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => Some(error.message),
        Ok(ErrorBody::Flat {
            message,
            detail,
            error,
        }) => [message, detail, error]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty()),
        Err(_) => None,
    };
    found.unwrap_or_else(|| snippet(body))
}

/// Lossy, length-capped view of a body for logs and errors.
pub(crate) fn snippet(body: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(body).into_owned();
    if text.len() > SNIPPET_MAX {
        truncate_at_char_boundary(&mut text, SNIPPET_MAX);
        text.push_str("...");
    }
    text
}

pub(crate) fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    s.truncate(cut);
}
