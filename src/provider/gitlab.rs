use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{
    http_client, inject_token, parse_timestamp, str_field, Listing, PagedRequest, Provider,
    Repository,
};
use crate::error::ProviderError;

/// Destination provider backed by a GitLab instance
///
/// Pushes land at `{instance}/{name}.git`, where the instance URL is the
/// API URL with its `/api/v4` suffix removed.
pub struct GitLabProvider {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitLabProvider {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Web root of the instance, derived from the API URL
    pub fn instance_url(&self) -> &str {
        self.api_url
            .strip_suffix("/api/v4")
            .unwrap_or(&self.api_url)
    }

    /// Convert a GitLab project object into a [`Repository`]
    fn to_repository(item: &Value) -> Option<Repository> {
        let name = str_field(item, "path").or_else(|| str_field(item, "name"))?;
        let remote_url = str_field(item, "http_url_to_repo")?;

        // statistics are only present for non-simple listings, in bytes
        let size = item
            .get("statistics")
            .and_then(|s| s.get("repository_size"))
            .and_then(Value::as_u64)
            .map(|bytes| bytes / 1024)
            .unwrap_or(0);

        Some(Repository {
            name: name.to_string(),
            remote_url: remote_url.to_string(),
            size,
            last_pushed_at: str_field(item, "last_activity_at").and_then(parse_timestamp),
        })
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    /// Projects the token's user is a member of
    async fn fetch_repos(&self, verbose: bool) -> Vec<Repository> {
        let authorization = format!("Bearer {}", self.token);
        let mut listing = Listing::default();

        let projects = PagedRequest {
            url: format!("{}/projects", self.api_url),
            authorization: &authorization,
            query: &[("membership", "true"), ("simple", "true")],
            context: "GitLab projects (membership)".to_string(),
        }
        .fetch_all(&self.client, verbose)
        .await;
        listing.extend(projects, Self::to_repository);

        info!("Found {} projects on GitLab", listing.len());
        listing.into_repos()
    }

    fn get_remote_url(&self, repo: &Repository) -> String {
        let target = format!("{}/{}.git", self.instance_url(), repo.name);
        inject_token(&target, &self.token)
    }

    fn provider_name(&self) -> &'static str {
        "GitLab"
    }
}
