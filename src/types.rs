use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::CiJobsError;

/// HTTP verbs accepted by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CiJobsError;

    /// Case-insensitive parse; `HEAD`, `OPTIONS` and friends are rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                CiJobsError::invalid_argument(
                    "method",
                    format!(
                        "unsupported HTTP method '{value}', \
                         expected one of GET, POST, PUT, PATCH, DELETE"
                    ),
                )
            })
    }
}

/// Value of a single query parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    /// Dropped from the URL entirely.
    Absent,
    One(String),
    /// Appended once per element under the same name.
    Many(Vec<String>),
}

impl QueryValue {
    /// Coerces a JSON value: `null` becomes [`QueryValue::Absent`], arrays
    /// become [`QueryValue::Many`] without their `null` elements, and any
    /// other value is rendered as a single string.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Absent,
            JsonValue::Array(items) => Self::Many(items.iter().filter_map(scalar_text).collect()),
            other => scalar_text(other).map_or(Self::Absent, Self::One),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl<T: Into<String>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, |value| Self::One(value.into()))
    }
}

impl<T: Into<String>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered query parameters.
pub type Query = Vec<(String, QueryValue)>;

/// Renders a JSON scalar as header/query text. Strings are used verbatim.
pub(crate) fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Everything needed to issue one request against the configured origin.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    /// Path relative to the origin.
    pub path: String,
    pub method: HttpMethod,
    pub query: Query,
    /// JSON body; `None` sends no body at all.
    pub body: Option<JsonValue>,
    /// Applied after the computed headers, so they may override them.
    pub headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Result of a request that reached the server, whatever its status code.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub status: u16,
    /// Parsed JSON for JSON content types, otherwise the raw text.
    pub data: JsonValue,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}
