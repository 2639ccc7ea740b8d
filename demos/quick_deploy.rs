use cijobs_http::{present, present_error, CiJobsClient};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let job_name = std::env::args().nth(1).unwrap_or_else(|| "web".to_owned());
    let client = CiJobsClient::from_env()?;

    let args = json!({
        "jobName": job_name,
        "projectName": std::env::var("CIJOBS_PROJECT").unwrap_or_else(|_| "demo".to_owned()),
        "title": "quick deploy from demo",
    });

    let result = match client.dispatch("quick_deploy", &args).await {
        Ok(outcome) => present(&outcome),
        Err(err) => present_error(&err),
    };
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
