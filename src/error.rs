/// Error type returned by this crate.
///
/// HTTP error statuses (4xx/5xx) are not errors here: they come back as a
/// regular [`crate::Outcome`] so callers can inspect the remote payload.
#[derive(Debug, thiserror::Error)]
pub enum CiJobsError {
    /// A required connection setting is missing or blank.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A caller-supplied argument is missing, blank or has the wrong type.
    #[error("invalid argument '{field}': {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: String,
        message: String,
    },
    /// The operation name is not one of the supported operations.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    /// Every transport attempt failed.
    #[error("request failed after {attempts} attempt(s): {source}")]
    RequestFailure {
        /// Total number of attempts performed.
        attempts: usize,
        /// Failure captured on the last attempt.
        #[source]
        source: AttemptError,
    },
}

impl CiJobsError {
    pub(crate) fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the offending field name for [`CiJobsError::InvalidArgument`].
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Why a single attempt did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The attempt exceeded its deadline and was cancelled.
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The response declared JSON but the body could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::{AttemptError, CiJobsError};

    #[test]
    fn invalid_argument_names_the_field() {
        let err = CiJobsError::invalid_argument("title", "must be a non-empty string");
        assert_eq!(err.field(), Some("title"));
        assert_eq!(
            err.to_string(),
            "invalid argument 'title': must be a non-empty string"
        );
    }

    #[test]
    fn request_failure_reports_attempts_and_cause() {
        let err = CiJobsError::RequestFailure {
            attempts: 3,
            source: AttemptError::Timeout { timeout_ms: 50 },
        };
        assert_eq!(
            err.to_string(),
            "request failed after 3 attempt(s): timed out after 50 ms"
        );
        assert_eq!(err.field(), None);
    }
}
