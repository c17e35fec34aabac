use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use crate::error::{HttpError, error_message, is_retryable_status, snippet};
use crate::redact::{RAW_BODY_MAX, curl_line, redacted_headers};
use crate::request::{Prepared, RequestOpts};

const RAW_ENV: &str = "PARLEY_HTTP_RAW";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RETRIES: usize = 2;
/// Minimum wait after a 429 that came without `Retry-After`.
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Successful response as received, before any decoding.
struct RawResponse {
    req_id: String,
    status: StatusCode,
    bytes: Vec<u8>,
}

/// What one attempt at a request came to.
enum Attempt {
    Done(RawResponse),
    /// Worth another try; `retry_after` is the server-requested wait, if any.
    Retry {
        error: HttpError,
        retry_after: Option<Duration>,
    },
    Fail(HttpError),
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Client anchored to `base`; relative request paths are joined onto it,
    /// so a base with a path should end in `/`.
    ///
    /// ```no_run
    /// use parley_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1/")?.with_retries(0);
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_RETRIES,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Extra attempts after the first for transient failures.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let raw = self.send::<()>(Method::GET, path, None, opts).await?;
        decode_json(raw)
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let raw = self.send(Method::POST, path, Some(body), opts).await?;
        decode_json(raw)
    }

    /// POST without a body, decoding a JSON response.
    pub async fn post_empty<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let raw = self.send::<()>(Method::POST, path, None, opts).await?;
        decode_json(raw)
    }

    /// Body as lossy UTF-8. Non-2xx statuses are `HttpError::Api`.
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        self.get_text_with_status(path, opts)
            .await
            .map(|(_, text)| text)
    }

    /// Like [`HttpClient::get_text`], but also reports which 2xx status came back.
    pub async fn get_text_with_status(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<(StatusCode, String), HttpError> {
        let raw = self.send::<()>(Method::GET, path, None, opts).await?;
        Ok((raw.status, String::from_utf8_lossy(&raw.bytes).into_owned()))
    }

    pub async fn get_bytes(&self, path: &str, opts: RequestOpts<'_>) -> Result<Vec<u8>, HttpError> {
        let raw = self.send::<()>(Method::GET, path, None, opts).await?;
        Ok(raw.bytes)
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        match Url::parse(path) {
            Ok(abs) if allow_absolute => Ok(abs),
            _ => self.base.join(path).map_err(|e| HttpError::Url(e.to_string())),
        }
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<RawResponse, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let prepared = Prepared::new(opts, body)?;
        let req_id = format!("r{}", uuid::Uuid::new_v4().simple());

        let mut retries = 0usize;
        loop {
            tracing::debug!(
                req_id = %req_id,
                attempt = retries + 1,
                max_retries,
                method = %method,
                host = url.host_str().unwrap_or("-"),
                path = url.path(),
                query = ?prepared.shown_query(),
                timeout_ms = timeout.as_millis() as u64,
                auth_kind = prepared.auth_kind,
                has_body = prepared.body.is_some(),
                "http.request.start"
            );

            let error = match self
                .attempt(&method, &url, &prepared, timeout, &req_id)
                .await
            {
                Attempt::Done(raw) => return Ok(raw),
                Attempt::Fail(error) => error,
                Attempt::Retry { error, .. } if retries >= max_retries => error,
                Attempt::Retry { error, retry_after } => {
                    retries += 1;
                    let delay = retry_after.unwrap_or_else(|| {
                        let base = backoff(retries);
                        if error.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
                            base.max(RATE_LIMIT_FLOOR)
                        } else {
                            base
                        }
                    });
                    tracing::warn!(
                        req_id = %req_id,
                        status = ?error.status(),
                        attempt = retries,
                        max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %error,
                        "http.retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            tracing::warn!(req_id = %req_id, error = %error, "http.error");
            return Err(error);
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        prepared: &Prepared<'_>,
        timeout: Duration,
        req_id: &str,
    ) -> Attempt {
        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout)
            .headers(prepared.headers.clone());
        if !prepared.query.is_empty() {
            rb = rb.query(&prepared.query_pairs());
        }
        if let Some(bytes) = &prepared.body {
            rb = rb
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes.clone());
        }
        if let Some(token) = &prepared.bearer {
            rb = rb.bearer_auth(token);
        }

        if raw_enabled() {
            let mut shown = url.clone();
            if !prepared.query.is_empty() {
                shown.query_pairs_mut().extend_pairs(prepared.query_pairs());
            }
            let curl = curl_line(method, &shown, &prepared.headers, prepared.body.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let started = Instant::now();
        let resp = match rb.send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(
                    %req_id,
                    timeout = err.is_timeout(),
                    redirect = err.is_redirect(),
                    error = %err,
                    "http.network_error.send"
                );
                return Attempt::Retry {
                    error: HttpError::Network(err.to_string()),
                    retry_after: None,
                };
            }
        };
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => {
                tracing::debug!(%req_id, error = %err, "http.network_error.body");
                return Attempt::Retry {
                    error: HttpError::Network(err.to_string()),
                    retry_after: None,
                };
            }
        };

        let request_id = server_request_id(&headers);
        tracing::debug!(
            %req_id,
            %status,
            duration_ms = started.elapsed().as_millis() as u64,
            body_len = bytes.len(),
            x_request_id = %request_id,
            rate_limit.remaining = ?headers
                .get("x-ratelimit-remaining-requests")
                .and_then(|v| v.to_str().ok()),
            "http.response.headers"
        );
        if raw_enabled() {
            let truncated = bytes.len() > RAW_BODY_MAX;
            let body = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_BODY_MAX)]);
            tracing::info!(
                target: "http.raw",
                %req_id,
                %status,
                headers = ?redacted_headers(&headers),
                body = %body,
                truncated,
                "response"
            );
        }

        if status.is_success() {
            return Attempt::Done(RawResponse {
                req_id: req_id.to_string(),
                status,
                bytes,
            });
        }

        let error = HttpError::Api {
            status,
            message: error_message(&bytes),
            request_id,
        };
        if is_retryable_status(status) {
            Attempt::Retry {
                error,
                retry_after: retry_after(&headers),
            }
        } else {
            Attempt::Fail(error)
        }
    }
}

fn server_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("x-correlation-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// 200ms, 400ms, 800ms, ...
fn backoff(retry: usize) -> Duration {
    let shift = retry.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200).saturating_mul(1 << shift)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn decode_json<T: DeserializeOwned>(raw: RawResponse) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(&raw.bytes).map_err(|e| {
        let body = snippet(&raw.bytes);
        tracing::warn!(
            req_id = %raw.req_id,
            line = e.line(),
            column = e.column(),
            error = %e,
            body_snippet = %body,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), body)
    })
}
