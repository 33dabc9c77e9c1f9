//! Snyk v1 REST API client.

use crate::error::{Result, ScannerError};
use crate::models::{dedupe_projects, ScannedProjectRecord};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for Snyk API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Client for the parts of the Snyk API the scanner needs.
pub struct SnykApiClient {
    client: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<ApiProject>,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    name: String,
    id: String,
}

impl From<ApiProject> for ScannedProjectRecord {
    fn from(p: ApiProject) -> Self {
        ScannedProjectRecord::new(p.name, p.id)
    }
}

impl SnykApiClient {
    /// Create a new client.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("snyk-history-scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// List the projects of an organization, one record per project name.
    pub async fn list_projects(&self, org: &str) -> Result<Vec<ScannedProjectRecord>> {
        let url = format!("{}/org/{}/projects", self.api_url, org);
        info!("Listing Snyk projects for org {}", org);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScannerError::SnykApi(format!(
                "failed to list projects for org {}, unexpected status code: {}",
                org, status
            )));
        }

        let body = response.text().await?;
        let projects = parse_projects(&body)?;
        debug!("Snyk returned {} unique projects", projects.len());
        Ok(projects)
    }
}

fn parse_projects(body: &str) -> Result<Vec<ScannedProjectRecord>> {
    let parsed: ListProjectsResponse = serde_json::from_str(body)?;
    Ok(dedupe_projects(parsed.projects.into_iter().map(Into::into).collect()))
}
