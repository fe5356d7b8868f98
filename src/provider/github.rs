use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    http_client, inject_token, parse_timestamp, str_field, Listing, PagedRequest, Provider,
    Repository,
};
use crate::error::ProviderError;

/// Source provider backed by the GitHub REST API
pub struct GitHubProvider {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubProvider {
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

    fn authorization(&self) -> String {
        format!("token {}", self.token)
    }

    /// Convert a GitHub API repository object into a [`Repository`]
    fn to_repository(item: &Value) -> Option<Repository> {
        let name = str_field(item, "name")?;
        let clone_url = str_field(item, "clone_url")?;

        Some(Repository {
            name: name.to_string(),
            remote_url: clone_url.to_string(),
            size: item.get("size").and_then(Value::as_u64).unwrap_or(0),
            last_pushed_at: str_field(item, "pushed_at").and_then(parse_timestamp),
        })
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    /// Personal repositories of every affiliation, unioned with the
    /// repositories of each organization the user belongs to.
    async fn fetch_repos(&self, verbose: bool) -> Vec<Repository> {
        let authorization = self.authorization();
        let mut listing = Listing::default();

        let user_repos = PagedRequest {
            url: format!("{}/user/repos", self.api_url),
            authorization: &authorization,
            query: &[
                ("visibility", "all"),
                ("affiliation", "owner,collaborator,organization_member"),
            ],
            context: "user repositories (visibility=all, all affiliations)".to_string(),
        }
        .fetch_all(&self.client, verbose)
        .await;
        listing.extend(user_repos, Self::to_repository);

        let orgs = PagedRequest {
            url: format!("{}/user/orgs", self.api_url),
            authorization: &authorization,
            query: &[],
            context: "organizations".to_string(),
        }
        .fetch_all(&self.client, verbose)
        .await;

        for org in &orgs {
            let Some(login) = str_field(org, "login") else {
                warn!("Skipping organization entry without a login");
                continue;
            };

            let org_repos = PagedRequest {
                url: format!("{}/orgs/{}/repos", self.api_url, login),
                authorization: &authorization,
                query: &[("type", "all")],
                context: format!("repositories for organization '{}'", login),
            }
            .fetch_all(&self.client, verbose)
            .await;
            listing.extend(org_repos, Self::to_repository);
        }

        info!(
            "Found {} repositories on GitHub ({} organizations)",
            listing.len(),
            orgs.len()
        );
        listing.into_repos()
    }

    fn get_remote_url(&self, repo: &Repository) -> String {
        inject_token(&repo.remote_url, &self.token)
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
