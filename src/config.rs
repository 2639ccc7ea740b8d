use std::fmt;

use crate::{CiJobsError, Result};

pub const ENV_BASE_URL: &str = "CIJOBS_BASE_URL";
pub const ENV_TOKEN: &str = "CIJOBS_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "CIJOBS_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "CIJOBS_MAX_RETRIES";

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Connection settings shared by every request.
///
/// Built once and treated as read-only afterwards. The origin has one trailing
/// slash stripped and always carries an explicit `http://` or `https://` scheme.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    origin: String,
    token: String,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("origin", &self.origin)
            .field("token", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ConnectionConfig {
    /// Creates a config with default timeout and retry settings.
    ///
    /// Fails when the origin or token is blank.
    pub fn new(origin: impl AsRef<str>, token: impl AsRef<str>) -> Result<Self> {
        let origin = origin.as_ref().trim();
        if origin.is_empty() {
            return Err(CiJobsError::Configuration(format!(
                "{ENV_BASE_URL} is missing or empty"
            )));
        }
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(CiJobsError::Configuration(format!(
                "{ENV_TOKEN} is missing or empty"
            )));
        }
        Ok(Self {
            origin: normalize_origin(origin),
            token: token.to_owned(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Reads the configuration from process environment variables.
    ///
    /// Reads:
    /// - `CIJOBS_BASE_URL` — API origin, scheme optional (defaults to `https://`)
    /// - `CIJOBS_TOKEN` — value sent in the `token` header
    /// - `CIJOBS_TIMEOUT_MS` — optional, defaults to 30000
    /// - `CIJOBS_MAX_RETRIES` — optional, defaults to 2
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cijobs_http::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::from_env().expect("missing CIJOBS_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an arbitrary key lookup.
    ///
    /// Numeric settings that are missing or malformed fall back to their
    /// defaults instead of failing.
    pub fn resolve_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = lookup(ENV_BASE_URL).unwrap_or_default();
        let token = lookup(ENV_TOKEN).unwrap_or_default();
        let config = Self::new(origin, token)?;

        let timeout_ms = lookup(ENV_TIMEOUT_MS)
            .as_deref()
            .and_then(parse_timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let max_retries = lookup(ENV_MAX_RETRIES)
            .as_deref()
            .and_then(parse_max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);

        Ok(config
            .with_timeout_ms(timeout_ms)
            .with_max_retries(max_retries))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Normalized origin, e.g. `https://ci.example.com`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Trims, strips one trailing slash and defaults the scheme to `https://`.
pub(crate) fn normalize_origin(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if has_http_scheme(trimmed) {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

fn has_http_scheme(value: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        value
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_timeout_ms(raw: &str) -> Option<u64> {
    parse_number(raw)
        .map(f64::trunc)
        .filter(|value| *value >= 1.0)
        .map(|value| value as u64)
}

fn parse_max_retries(raw: &str) -> Option<usize> {
    parse_number(raw)
        .map(f64::trunc)
        .filter(|value| *value >= 0.0)
        .map(|value| value as usize)
}
