use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::borrow::Cow;
use std::time::Duration;

use crate::error::HttpError;
use crate::redact::shown_param;

/// How a request proves who it is.
///
/// ```
/// use parley_http::Auth;
/// use std::borrow::Cow;
///
/// let proxy = Auth::Query { name: "api_key", value: Cow::Borrowed("demo") };
/// assert_eq!(proxy.kind(), "query");
/// assert_eq!(Auth::Bearer("sk-...").kind(), "bearer");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`; the token is cleaned up before use.
    Bearer(&'a str),
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Credential carried as a query parameter (the scraping proxy's `api_key`).
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
    None,
}

impl Auth<'_> {
    /// Label used in logs in place of the credential.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request overrides. Unset fields fall back to the client's defaults.
///
/// ```
/// use parley_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     query: Some(vec![("render_js", Cow::Borrowed("false"))]),
///     auth: Some(Auth::Query { name: "api_key", value: Cow::Borrowed("demo") }),
///     ..Default::default()
/// };
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// Treat an absolute `path` as the full URL instead of joining it to the base.
    pub allow_absolute: bool,
}

/// Everything about a request that stays fixed across retries.
pub(crate) struct Prepared<'a> {
    pub query: Vec<(&'a str, Cow<'a, str>)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub bearer: Option<String>,
    pub auth_kind: &'static str,
}

impl<'a> Prepared<'a> {
    pub fn new<B>(opts: RequestOpts<'a>, body: Option<&B>) -> Result<Self, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let auth_kind = opts.auth.as_ref().map_or("none", |a| a.kind());
        let mut query = opts.query.unwrap_or_default();
        let mut headers = opts.headers.unwrap_or_default();
        let mut bearer = None;

        match opts.auth {
            Some(Auth::Bearer(token)) => bearer = Some(clean_bearer_token(token)?),
            Some(Auth::Header { name, value }) => {
                headers.insert(name, value);
            }
            Some(Auth::Query { name, value }) => query.push((name, value)),
            Some(Auth::None) | None => {}
        }

        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("encode body: {e}")))?;

        Ok(Self {
            query,
            headers,
            body,
            bearer,
            auth_kind,
        })
    }

    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        self.query.iter().map(|(k, v)| (*k, v.as_ref())).collect()
    }

    /// Query as it may be logged.
    pub fn shown_query(&self) -> Vec<(&str, &str)> {
        self.query
            .iter()
            .map(|(k, v)| (*k, shown_param(k, v)))
            .collect()
    }
}

/// Tokens pasted from dashboards or env files often carry quotes or line
/// breaks; strip them and reject anything that cannot be a header value.
pub(crate) fn clean_bearer_token(raw: &str) -> Result<String, HttpError> {
    let token: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if !token.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if token.bytes().any(|b| b.is_ascii_control()) {
        return Err(HttpError::Build("API key contains control characters".into()));
    }
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_cleaned() {
        assert_eq!(clean_bearer_token(" \"sk-abc\n\" ").unwrap(), "sk-abc");
        assert!(clean_bearer_token("sk-ä").is_err());
        assert!(clean_bearer_token("sk-\u{7f}x").is_err());
    }

    #[test]
    fn query_auth_joins_query_and_is_hidden_from_logs() {
        let opts = RequestOpts {
            query: Some(vec![("url", Cow::Borrowed("https://a.b"))]),
            auth: Some(Auth::Query {
                name: "api_key",
                value: Cow::Borrowed("pk-live"),
            }),
            ..Default::default()
        };
        let prepared = Prepared::new::<()>(opts, None).unwrap();
        assert_eq!(prepared.auth_kind, "query");
        assert_eq!(
            prepared.query_pairs(),
            vec![("url", "https://a.b"), ("api_key", "pk-live")]
        );
        assert_eq!(
            prepared.shown_query(),
            vec![("url", "https://a.b"), ("api_key", "<redacted>")]
        );
        assert!(prepared.bearer.is_none() && prepared.body.is_none());
    }
}
