use serde_json::{Map, Value as JsonValue};

use crate::{
    endpoint::encode_path_segment, types::scalar_text, CiJobsClient, CiJobsError, HttpMethod,
    Outcome, Query, QueryValue, RequestSpec, Result,
};

const QUICK_DEPLOY_PATH: &str = "/api/cijobs/v1/triggerquickdeploy";
const ROLLBACK_PATH: &str = "/api/cijobs/v1/rollback";
const ABORT_PATH: &str = "/api/cijobs/v1/abort";

/// Identifies a job, optionally pinned to one build.
///
/// Built through [`JobTarget::new`], so the required fields are never blank.
#[derive(Clone, Debug, PartialEq)]
pub struct JobTarget {
    job_name: String,
    project_name: String,
    title: String,
    /// Already rendered as a path segment, e.g. `"7"`.
    build_number: Option<String>,
    headers: Vec<(String, String)>,
}

/// One validated operation, ready to become a request.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    QuickDeploy(JobTarget),
    Rollback {
        project_name: String,
        title: String,
        headers: Vec<(String, String)>,
    },
    Abort(JobTarget),
    /// Passthrough to any API path.
    Call(RequestSpec),
}

impl Operation {
    pub const QUICK_DEPLOY: &'static str = "quick_deploy";
    pub const ROLLBACK: &'static str = "rollback";
    pub const ABORT: &'static str = "abort";
    pub const CALL: &'static str = "call";

    /// Operation names with a one-line description each.
    pub fn catalog() -> [(&'static str, &'static str); 4] {
        [
            (
                Self::QUICK_DEPLOY,
                "Trigger a quick deploy of a job, optionally for a specific build number",
            ),
            (Self::ROLLBACK, "Roll back the latest deployment of a project"),
            (
                Self::ABORT,
                "Abort a running job, optionally a specific build number",
            ),
            (
                Self::CALL,
                "Call any API path with a method, query, body and headers",
            ),
        ]
    }

    /// Validates an argument bag for the named operation.
    ///
    /// Names are matched case-insensitively with `-` and `_` treated alike,
    /// so `quick-deploy` and `quick_deploy` are the same operation.
    pub fn parse(name: &str, args: &JsonValue) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        if !Self::catalog().iter().any(|(known, _)| *known == normalized) {
            return Err(CiJobsError::UnknownOperation(name.to_owned()));
        }

        let empty = Map::new();
        let args = match args {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            _ => {
                return Err(CiJobsError::invalid_argument(
                    "arguments",
                    "must be a JSON object",
                ))
            }
        };

        match normalized.as_str() {
            Self::QUICK_DEPLOY => Ok(Self::QuickDeploy(JobTarget::parse(args)?)),
            Self::ROLLBACK => Ok(Self::Rollback {
                project_name: required_string(args, "projectName")?,
                title: required_string(args, "title")?,
                headers: optional_headers(args)?,
            }),
            Self::ABORT => Ok(Self::Abort(JobTarget::parse(args)?)),
            Self::CALL => parse_call(args).map(Self::Call),
            _ => Err(CiJobsError::UnknownOperation(name.to_owned())),
        }
    }

    /// Re-checks required fields, for operations built by hand.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::QuickDeploy(target) | Self::Abort(target) => target.validate(),
            Self::Rollback {
                project_name,
                title,
                ..
            } => {
                ensure_non_blank("projectName", project_name)?;
                ensure_non_blank("title", title)
            }
            Self::Call(request) => ensure_non_blank("path", &request.path),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QuickDeploy(_) => Self::QUICK_DEPLOY,
            Self::Rollback { .. } => Self::ROLLBACK,
            Self::Abort(_) => Self::ABORT,
            Self::Call(_) => Self::CALL,
        }
    }

    pub fn into_request(self) -> RequestSpec {
        match self {
            Self::QuickDeploy(target) => target.into_request(HttpMethod::Post, QUICK_DEPLOY_PATH),
            Self::Rollback {
                project_name,
                title,
                headers,
            } => RequestSpec::new(HttpMethod::Post, ROLLBACK_PATH)
                .query_param("projectName", project_name)
                .query_param("title", title)
                .headers(headers),
            Self::Abort(target) => target.into_request(HttpMethod::Put, ABORT_PATH),
            Self::Call(request) => request,
        }
    }
}

impl JobTarget {
    /// Fails with [`CiJobsError::InvalidArgument`] naming the first blank field.
    pub fn new(
        job_name: impl Into<String>,
        project_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let target = Self {
            job_name: job_name.into(),
            project_name: project_name.into(),
            title: title.into(),
            build_number: None,
            headers: Vec::new(),
        };
        target.validate()?;
        Ok(target)
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = Some(build_number.to_string());
        self
    }

    /// Extra headers, applied after the computed ones.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn build_number(&self) -> Option<&str> {
        self.build_number.as_deref()
    }

    fn validate(&self) -> Result<()> {
        ensure_non_blank("jobName", &self.job_name)?;
        ensure_non_blank("projectName", &self.project_name)?;
        ensure_non_blank("title", &self.title)
    }

    fn parse(args: &Map<String, JsonValue>) -> Result<Self> {
        Ok(Self {
            job_name: required_string(args, "jobName")?,
            project_name: required_string(args, "projectName")?,
            title: required_string(args, "title")?,
            build_number: optional_build_number(args)?,
            headers: optional_headers(args)?,
        })
    }

    /// `{prefix}/{jobName}` or `{prefix}/{jobName}/{buildNumber}`.
    pub fn path(&self, prefix: &str) -> String {
        let mut path = format!("{prefix}/{}", encode_path_segment(&self.job_name));
        if let Some(build_number) = &self.build_number {
            path.push('/');
            path.push_str(build_number);
        }
        path
    }

    fn into_request(self, method: HttpMethod, prefix: &str) -> RequestSpec {
        RequestSpec::new(method, self.path(prefix))
            .query_param("projectName", self.project_name)
            .query_param("title", self.title)
            .headers(self.headers)
    }
}

impl CiJobsClient {
    /// Validates `args` for the named operation and executes it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cijobs_http::CiJobsClient;
    /// use serde_json::json;
    ///
    /// # async fn run() -> cijobs_http::Result<()> {
    /// let client = CiJobsClient::from_env()?;
    /// let outcome = client
    ///     .dispatch(
    ///         "quick_deploy",
    ///         &json!({"jobName": "web", "projectName": "shop", "title": "hotfix"}),
    ///     )
    ///     .await?;
    /// println!("{}", outcome.status);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn dispatch(&self, name: &str, args: &JsonValue) -> Result<Outcome> {
        let operation = Operation::parse(name, args)?;
        self.run(operation).await
    }

    /// Validates and executes an already-built operation.
    pub async fn run(&self, operation: Operation) -> Result<Outcome> {
        operation.validate()?;

        #[cfg(feature = "tracing")]
        tracing::info!(operation = operation.name(), "dispatching operation");

        self.execute(operation.into_request()).await
    }

    pub async fn quick_deploy(&self, target: JobTarget) -> Result<Outcome> {
        self.run(Operation::QuickDeploy(target)).await
    }

    pub async fn rollback(
        &self,
        project_name: impl Into<String>,
        title: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Result<Outcome> {
        self.run(Operation::Rollback {
            project_name: project_name.into(),
            title: title.into(),
            headers,
        })
        .await
    }

    pub async fn abort(&self, target: JobTarget) -> Result<Outcome> {
        self.run(Operation::Abort(target)).await
    }
}

fn parse_call(args: &Map<String, JsonValue>) -> Result<RequestSpec> {
    let path = required_string(args, "path")?;
    let method = required_string(args, "method")?.parse::<HttpMethod>()?;

    let query: Query = match args.get("query") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Object(map)) => map
            .iter()
            .map(|(name, value)| (name.clone(), QueryValue::from_json(value)))
            .collect(),
        Some(_) => {
            return Err(CiJobsError::invalid_argument(
                "query",
                "must be a JSON object",
            ))
        }
    };

    let body = match args.get("body") {
        None | Some(JsonValue::Null) => None,
        Some(body) => Some(body.clone()),
    };

    Ok(RequestSpec {
        path,
        method,
        query,
        body,
        headers: optional_headers(args)?,
    })
}

/// Checked for blankness after trimming, forwarded as given.
fn required_string(args: &Map<String, JsonValue>, field: &str) -> Result<String> {
    match args.get(field) {
        Some(JsonValue::String(value)) => {
            ensure_non_blank(field, value)?;
            Ok(value.clone())
        }
        _ => Err(CiJobsError::invalid_argument(
            field,
            "must be a non-empty string",
        )),
    }
}

fn ensure_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CiJobsError::invalid_argument(
            field,
            "must be a non-empty string",
        ));
    }
    Ok(())
}

/// Finite numbers or numeric strings; integral values render without `.0`.
fn optional_build_number(args: &Map<String, JsonValue>) -> Result<Option<String>> {
    const FIELD: &str = "buildNumber";
    let invalid = || CiJobsError::invalid_argument(FIELD, "must be a finite number");

    let number = match args.get(FIELD) {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::Number(number)) => {
            if number.is_i64() || number.is_u64() {
                return Ok(Some(number.to_string()));
            }
            number.as_f64().ok_or_else(invalid)?
        }
        Some(JsonValue::String(text)) => text.trim().parse::<f64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };

    if !number.is_finite() {
        return Err(invalid());
    }
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Ok(Some(format!("{}", number as i64)))
    } else {
        Ok(Some(number.to_string()))
    }
}

/// Header values may be any JSON scalar and are coerced to strings.
fn optional_headers(args: &Map<String, JsonValue>) -> Result<Vec<(String, String)>> {
    match args.get("headers") {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Object(map)) => Ok(map
            .iter()
            .filter_map(|(name, value)| scalar_text(value).map(|value| (name.clone(), value)))
            .collect()),
        Some(_) => Err(CiJobsError::invalid_argument(
            "headers",
            "must be a JSON object",
        )),
    }
}
