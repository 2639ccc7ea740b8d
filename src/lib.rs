//! `cijobs-http` is a resilient async HTTP client for a CI/CD job API.
//!
//! It exposes the operations an agent tool layer needs:
//! - [`CiJobsClient::quick_deploy`]
//! - [`CiJobsClient::rollback`]
//! - [`CiJobsClient::abort`]
//! - [`CiJobsClient::execute`] for any other API path
//!
//! Tool calls arrive as a name plus JSON arguments through
//! [`CiJobsClient::dispatch`]; results are turned into tool output with
//! [`present`].

mod client;
mod config;
mod endpoint;
mod error;
mod operation;
mod presenter;
mod types;

pub use client::{backoff_delay, CiJobsClient, BACKOFF_STEP_MS, TOKEN_HEADER};
pub use config::{
    ConnectionConfig, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS, ENV_BASE_URL, ENV_MAX_RETRIES,
    ENV_TIMEOUT_MS, ENV_TOKEN,
};
pub use endpoint::{compose_url, encode_path_segment};
pub use error::{AttemptError, CiJobsError};
pub use operation::{JobTarget, Operation};
pub use presenter::{present, present_error, Content, ToolResult};
pub use types::{HttpMethod, Outcome, Query, QueryValue, RequestSpec};

pub type Result<T> = std::result::Result<T, CiJobsError>;
