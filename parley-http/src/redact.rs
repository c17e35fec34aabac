//! Keeping credentials out of logs.

use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Method, Url};

use crate::error::truncate_at_char_boundary;

pub(crate) const REDACTED: &str = "<redacted>";

/// Query parameter names whose values are credentials.
const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "bearer",
    "client_secret",
    "key",
    "secret",
    "token",
];

/// Cap on bodies included in raw dumps.
pub(crate) const RAW_BODY_MAX: usize = 64 * 1024;

pub(crate) fn is_secret_param(name: &str) -> bool {
    SECRET_PARAMS
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}

/// Value as it may appear in a log line.
pub(crate) fn shown_param<'v>(name: &str, value: &'v str) -> &'v str {
    if is_secret_param(name) { REDACTED } else { value }
}

/// `url` with every secret query value replaced.
pub(crate) fn redacted_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let shown = shown_param(&k, &v).to_string();
            (k.into_owned(), shown)
        })
        .collect();
    let mut clean = url.clone();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean.to_string()
}

pub(crate) fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if *name == AUTHORIZATION {
                REDACTED
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            (name.as_str().to_string(), shown.to_string())
        })
        .collect()
}

/// A copy-pasteable curl line with credentials redacted.
pub(crate) fn curl_line(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', r"'\''"));

    let mut line = format!("curl -X{method}");
    for (name, value) in redacted_headers(headers) {
        line.push_str(" -H ");
        line.push_str(&quote(&format!("{name}: {value}")));
    }
    match body.map(std::str::from_utf8) {
        Some(Ok(text)) => {
            let mut text = text.to_string();
            if text.len() > RAW_BODY_MAX {
                truncate_at_char_boundary(&mut text, RAW_BODY_MAX);
                text.push('…');
            }
            line.push_str(" -d ");
            line.push_str(&quote(&text));
        }
        Some(Err(_)) => {
            if let Some(bytes) = body {
                line.push_str(&format!(" --data-binary @- # ({} bytes)", bytes.len()));
            }
        }
        None => {}
    }
    line.push(' ');
    line.push_str(&quote(&redacted_url(url)));
    line
}
