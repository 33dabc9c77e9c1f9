//! GitHub API client using octocrab.

use crate::config::GitHubConfig;
use crate::error::{Result, ScannerError};
use crate::models::RepositoryTag;
use octocrab::Octocrab;
use tracing::{debug, info};

/// GitHub API client for the product repository's metadata.
pub struct GitHubClient {
    client: Octocrab,
    config: GitHubConfig,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();

        if let Some(ref token) = config.token {
            builder = builder.personal_token(token.clone());
        }

        if config.api_url != "https://api.github.com" {
            builder = builder.base_uri(&config.api_url)?;
        }

        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// List every tag of a repository, following pagination.
    pub async fn list_tags(&self, owner: &str, name: &str) -> Result<Vec<RepositoryTag>> {
        info!("Listing tags for {}/{}", owner, name);

        let first_page = self
            .client
            .repos(owner, name)
            .list_tags()
            .per_page(self.config.tags_per_page)
            .send()
            .await
            .map_err(|e| ScannerError::GitHub(format!("Failed to list tags for {}/{}: {}", owner, name, e)))?;

        let tags = self.client.all_pages(first_page).await?;

        let tags: Vec<RepositoryTag> = tags
            .into_iter()
            .map(|t| RepositoryTag::new(t.name, t.commit.sha))
            .collect();

        info!("Found {} tags in {}/{}", tags.len(), owner, name);
        debug!("Tags: {:?}", tags.iter().map(|t| &t.name).collect::<Vec<_>>());
        Ok(tags)
    }

    /// HTTPS clone URL of a repository.
    pub async fn clone_url(&self, owner: &str, name: &str) -> Result<String> {
        let repo = self
            .client
            .repos(owner, name)
            .get()
            .await
            .map_err(|e| ScannerError::GitHub(format!("Failed to get repo {}/{}: {}", owner, name, e)))?;

        repo.clone_url
            .map(|url| url.to_string())
            .ok_or_else(|| ScannerError::GitHub(format!("Repository {}/{} has no clone URL", owner, name)))
    }
}
