use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout};

use crate::{
    endpoint::compose_url, AttemptError, CiJobsError, ConnectionConfig, Outcome, RequestSpec,
    Result,
};

/// Header carrying the credential token.
pub const TOKEN_HEADER: &str = "token";

/// Linear backoff step between failed attempts.
pub const BACKOFF_STEP_MS: u64 = 300;

/// Delay before the attempt following `attempt` (zero-based).
///
/// Example: attempt `0` → 300 ms, attempt `1` → 600 ms.
pub fn backoff_delay(attempt: usize) -> Duration {
    let step = u64::try_from(attempt).unwrap_or(u64::MAX).saturating_add(1);
    Duration::from_millis(step.saturating_mul(BACKOFF_STEP_MS))
}

#[derive(Clone)]
/// HTTP client for the CI job API.
///
/// Cheap to clone; the config is read-only and the inner `reqwest::Client`
/// shares its connection pool.
pub struct CiJobsClient {
    http: reqwest::Client,
    config: ConnectionConfig,
}

impl fmt::Debug for CiJobsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CiJobsClient")
            .field("config", &self.config)
            .finish()
    }
}

impl CiJobsClient {
    /// Creates a client with a default `reqwest::Client`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cijobs_http::{CiJobsClient, ConnectionConfig};
    ///
    /// let config = ConnectionConfig::new("ci.example.com", "my-token").expect("valid config");
    /// let client = CiJobsClient::new(config.with_max_retries(0));
    /// ```
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Creates a client around a preconfigured `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: ConnectionConfig) -> Self {
        Self { http, config }
    }

    /// Creates a client from `CIJOBS_*` environment variables.
    ///
    /// See [`ConnectionConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        ConnectionConfig::from_env().map(Self::new)
    }

    /// Connection settings used for every request.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sends one request, retrying transport failures.
    ///
    /// Any response that arrives is returned as an [`Outcome`], including
    /// 4xx and 5xx statuses. Only transport failures, per-attempt timeouts
    /// and unparseable JSON bodies are retried; after `max_retries + 1`
    /// failed attempts the last failure is returned as
    /// [`CiJobsError::RequestFailure`].
    pub async fn execute(&self, request: RequestSpec) -> Result<Outcome> {
        let url = compose_url(self.config.origin(), &request.path, &request.query)?;
        let headers = self.build_headers(&request)?;
        let body = request
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| CiJobsError::invalid_argument("body", err.to_string()))?;
        let method = request.method.to_reqwest();
        let total_attempts = self.config.max_retries.saturating_add(1);

        let mut attempt = 0usize;
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %request.method,
                url = %url,
                attempt = attempt + 1,
                total_attempts,
                "sending request"
            );

            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let error = match self.attempt(builder).await {
                Ok(outcome) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        status = outcome.status,
                        attempt = attempt + 1,
                        "response received"
                    );
                    return Ok(outcome);
                }
                Err(error) => error,
            };

            if attempt + 1 >= total_attempts {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    method = %request.method,
                    url = %url,
                    attempts = total_attempts,
                    error = %error,
                    "request failed, no attempts left"
                );
                return Err(CiJobsError::RequestFailure {
                    attempts: total_attempts,
                    source: error,
                });
            }

            let delay = backoff_delay(attempt);

            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempt = attempt + 1,
                error = %error,
                "attempt failed, retrying after {} ms",
                delay.as_millis()
            );
            #[cfg(not(feature = "tracing"))]
            let _ = error;

            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Runs one attempt under its own deadline.
    ///
    /// The timer lives inside the `timeout` future, so it is released on
    /// every exit path; on expiry the in-flight request future is dropped,
    /// which cancels the connection.
    async fn attempt(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> std::result::Result<Outcome, AttemptError> {
        let timeout_ms = self.config.timeout_ms;
        match timeout(Duration::from_millis(timeout_ms), send_and_decode(builder)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout { timeout_ms }),
        }
    }

    fn build_headers(&self, request: &RequestSpec) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let token = HeaderValue::from_str(self.config.token()).map_err(|_| {
            CiJobsError::Configuration(
                "token contains characters not allowed in a header".to_owned(),
            )
        })?;
        headers.insert(HeaderName::from_static(TOKEN_HEADER), token);
        if request.body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                CiJobsError::invalid_argument("headers", format!("invalid header name '{name}'"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                CiJobsError::invalid_argument(
                    "headers",
                    format!("invalid value for header '{name}'"),
                )
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

async fn send_and_decode(
    builder: reqwest::RequestBuilder,
) -> std::result::Result<Outcome, AttemptError> {
    let response = builder.send().await.map_err(AttemptError::Transport)?;
    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());
    let is_json = headers
        .get(header::CONTENT_TYPE.as_str())
        .is_some_and(|value| is_json_content_type(value));
    let text = response.text().await.map_err(AttemptError::Transport)?;

    let data = if is_json {
        serde_json::from_str::<JsonValue>(&text).map_err(|err| {
            AttemptError::Decode(format!("invalid JSON response body: {err}; body: {text}"))
        })?
    } else {
        JsonValue::String(text)
    };

    Ok(Outcome {
        status,
        data,
        headers,
    })
}

/// Flattens a header map into lower-cased name → value pairs.
///
/// Repeated headers are joined with `", "`.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

/// `application/json` and `application/*+json`, parameters ignored.
fn is_json_content_type(value: &str) -> bool {
    let media_type = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json"
        || (media_type.starts_with("application/") && media_type.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;

    use super::{backoff_delay, collect_headers, is_json_content_type, CiJobsClient};
    use crate::{ConnectionConfig, HttpMethod, RequestSpec};

    fn client() -> CiJobsClient {
        CiJobsClient::new(
            ConnectionConfig::new("ci.example.com", "secret-token").expect("valid config"),
        )
    }

    #[test]
    fn backoff_grows_linearly() {
        assert_eq!(backoff_delay(0), Duration::from_millis(300));
        assert_eq!(backoff_delay(1), Duration::from_millis(600));
        assert_eq!(backoff_delay(4), Duration::from_millis(1_500));
    }

    #[test]
    fn json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("text/json+html"));
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("Set-Cookie", HeaderValue::from_static("a=1"));
        headers.append("Set-Cookie", HeaderValue::from_static("b=2"));
        headers.insert("X-Request-Id", HeaderValue::from_static("abc"));
        let collected = collect_headers(&headers);
        assert_eq!(collected["set-cookie"], "a=1, b=2");
        assert_eq!(collected["x-request-id"], "abc");
    }

    #[test]
    fn content_type_only_set_with_body() {
        let client = client();
        let without = client
            .build_headers(&RequestSpec::new(HttpMethod::Get, "/api"))
            .expect("valid headers");
        assert!(without.get("content-type").is_none());
        assert_eq!(without["accept"], "application/json");
        assert_eq!(without["token"], "secret-token");

        let with = client
            .build_headers(&RequestSpec::new(HttpMethod::Post, "/api").body(json!({})))
            .expect("valid headers");
        assert_eq!(with["content-type"], "application/json");
    }

    #[test]
    fn caller_headers_override_computed_ones() {
        let headers = client()
            .build_headers(
                &RequestSpec::new(HttpMethod::Get, "/api")
                    .header("token", "other")
                    .header("X-Trace", "1"),
            )
            .expect("valid headers");
        assert_eq!(headers["token"], "other");
        assert_eq!(headers["x-trace"], "1");
        assert_eq!(headers.get_all("token").iter().count(), 1);
    }

    #[test]
    fn invalid_header_name_is_invalid_argument() {
        let err = client()
            .build_headers(&RequestSpec::new(HttpMethod::Get, "/api").header("bad header", "x"))
            .expect_err("space is not allowed in header names");
        assert_eq!(err.field(), Some("headers"));
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
