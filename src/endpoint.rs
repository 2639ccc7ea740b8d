use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::{CiJobsError, QueryValue, Result};

/// Characters left untouched when a value is inserted as a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a value so it stays one path segment (`/` becomes `%2F`).
pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Builds an absolute URL from the origin, a relative path and query params.
///
/// The path is always resolved underneath the origin, with or without a
/// leading `/`; paths that resolve to another origin are rejected. Absent
/// query values are skipped and list values are repeated under the same name.
///
/// Example: `("https://ci.io", "/api/jobs", [("tag", ["a", "b"])])`
/// → `"https://ci.io/api/jobs?tag=a&tag=b"`
pub fn compose_url(origin: &str, path: &str, query: &[(String, QueryValue)]) -> Result<Url> {
    let base = format!("{}/", origin.trim_end_matches('/'));
    let base = Url::parse(&base).map_err(|err| {
        CiJobsError::Configuration(format!("invalid origin '{origin}': {err}"))
    })?;
    let mut url = base
        .join(path.trim_start_matches('/'))
        .map_err(|err| CiJobsError::invalid_argument("path", format!("invalid path: {err}")))?;
    // An absolute path would otherwise send the token to another host.
    if url.origin() != base.origin() {
        return Err(CiJobsError::invalid_argument(
            "path",
            format!("'{path}' must be relative to the configured origin"),
        ));
    }

    let mut pairs = query
        .iter()
        .flat_map(|(name, value)| match value {
            QueryValue::Absent => Vec::new(),
            QueryValue::One(value) => vec![(name.as_str(), value.as_str())],
            QueryValue::Many(values) => values
                .iter()
                .map(|value| (name.as_str(), value.as_str()))
                .collect(),
        })
        .peekable();

    // An empty `query_pairs_mut` would still leave a trailing `?`.
    if pairs.peek().is_some() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{compose_url, encode_path_segment};
    use crate::QueryValue;

    fn query(pairs: &[(&str, QueryValue)]) -> Vec<(String, QueryValue)> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn path_resolves_with_or_without_leading_slash() {
        let with = compose_url("https://ci.example.com", "/api/cijobs/v1/rollback", &[])
            .expect("valid url");
        let without = compose_url("https://ci.example.com", "api/cijobs/v1/rollback", &[])
            .expect("valid url");
        assert_eq!(with.as_str(), "https://ci.example.com/api/cijobs/v1/rollback");
        assert_eq!(with, without);
    }

    #[test]
    fn absolute_path_to_other_host_is_rejected() {
        let err = compose_url("https://ci.example.com", "https://evil.example/steal", &[])
            .expect_err("foreign origin must be rejected");
        assert_eq!(err.field(), Some("path"));

        let err = compose_url("https://ci.example.com", "http://ci.example.com/api", &[])
            .expect_err("scheme change is another origin");
        assert_eq!(err.field(), Some("path"));
    }

    #[test]
    fn protocol_relative_path_stays_on_origin() {
        let url = compose_url("https://ci.example.com", "//evil.example/x", &[])
            .expect("leading slashes are stripped");
        assert_eq!(url.host_str(), Some("ci.example.com"));
        assert_eq!(url.as_str(), "https://ci.example.com/evil.example/x");
    }

    #[test]
    fn origin_path_prefix_is_kept() {
        let url = compose_url("https://ci.example.com/gateway", "/api/ping", &[])
            .expect("valid url");
        assert_eq!(url.as_str(), "https://ci.example.com/gateway/api/ping");
    }

    #[test]
    fn list_values_repeat_and_absent_values_drop() {
        let url = compose_url(
            "http://localhost:8080",
            "api/jobs",
            &query(&[
                ("tag", QueryValue::from(vec!["a", "b"])),
                ("skip", QueryValue::Absent),
                ("q", QueryValue::from("x y")),
            ]),
        )
        .expect("valid url");
        assert_eq!(url.as_str(), "http://localhost:8080/api/jobs?tag=a&tag=b&q=x+y");
    }

    #[test]
    fn sparse_query_leaves_no_question_mark() {
        let url = compose_url(
            "https://ci.example.com",
            "/api",
            &query(&[("skip", QueryValue::Absent)]),
        )
        .expect("valid url");
        assert_eq!(url.as_str(), "https://ci.example.com/api");
    }

    #[test]
    fn segment_encoding_escapes_separators() {
        assert_eq!(encode_path_segment("My Job/2"), "My%20Job%2F2");
        assert_eq!(encode_path_segment("job-1_(a)"), "job-1_(a)");
    }
}
