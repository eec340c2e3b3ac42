use async_trait::async_trait;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{is_not_found_error, MirrorError};
use crate::provider::{CustomProperty, NewRepository, RepositoryProvider, RepositoryRecord};

/// GitHub caps search results at 100 per page.
pub const SEARCH_PAGE_SIZE: u32 = 100;

/// Search never serves results past this offset, whatever `total_count` says.
pub const SEARCH_RESULT_LIMIT: u32 = 1000;

#[derive(Deserialize)]
struct OrganizationRecord {
    login: String,
}

#[derive(Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: u32,
    page: u32,
}

#[derive(Deserialize)]
struct SearchPage {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<RepositoryRecord>,
}

/// `RepositoryProvider` backed by the GitHub REST API.
#[derive(Clone)]
pub struct GithubProvider {
    client: Octocrab,
    page_size: u32,
}

impl GithubProvider {
    /// Builds a token-authenticated client, optionally against a non-default API root.
    ///
    /// Requests are sent exactly once; transient failures surface to the caller.
    pub fn configure_provider(token: &str, base_url: Option<&str>) -> Result<Self, MirrorError> {
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .add_retry_config(RetryConfig::None);
        if let Some(url) = base_url {
            builder = builder.base_uri(url)?;
        }

        Ok(Self::from_octocrab(builder.build()?))
    }

    pub fn from_octocrab(client: Octocrab) -> Self {
        GithubProvider {
            client,
            page_size: SEARCH_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, SEARCH_PAGE_SIZE);
        self
    }
}

fn not_found_as(what: String) -> impl FnOnce(octocrab::Error) -> MirrorError {
    move |e| {
        if is_not_found_error(&e) {
            MirrorError::NotFound(what)
        } else {
            MirrorError::UpstreamApi(e)
        }
    }
}

#[async_trait]
impl RepositoryProvider for GithubProvider {
    async fn organization_login(&self, org: &str) -> Result<String, MirrorError> {
        let record: OrganizationRecord = self
            .client
            .get(format!("/orgs/{}", org), None::<&()>)
            .await
            .map_err(not_found_as(format!("organization {}", org)))?;

        Ok(record.login)
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryRecord, MirrorError> {
        self.client
            .get(format!("/repos/{}/{}", owner, name), None::<&()>)
            .await
            .map_err(not_found_as(format!("repository {}/{}", owner, name)))
    }

    async fn create_repository(
        &self,
        org: &str,
        repository: &NewRepository,
    ) -> Result<RepositoryRecord, MirrorError> {
        let record = self
            .client
            .post(format!("/orgs/{}/repos", org), Some(repository))
            .await?;

        Ok(record)
    }

    async fn update_repository_name(
        &self,
        owner: &str,
        name: &str,
        new_name: &str,
    ) -> Result<RepositoryRecord, MirrorError> {
        self.client
            .patch(
                format!("/repos/{}/{}", owner, name),
                Some(&json!({ "name": new_name })),
            )
            .await
            .map_err(not_found_as(format!("repository {}/{}", owner, name)))
    }

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<(), MirrorError> {
        self.client
            .repos(owner, name)
            .delete()
            .await
            .map_err(not_found_as(format!("repository {}/{}", owner, name)))
    }

    async fn list_custom_properties(&self, org: &str) -> Result<Vec<CustomProperty>, MirrorError> {
        let properties = self
            .client
            .get(format!("/orgs/{}/properties/schema", org), None::<&()>)
            .await?;

        Ok(properties)
    }

    async fn create_custom_property(
        &self,
        org: &str,
        property: &CustomProperty,
    ) -> Result<CustomProperty, MirrorError> {
        let created = self
            .client
            .put(
                format!(
                    "/orgs/{}/properties/schema/{}",
                    org, property.property_name
                ),
                Some(&json!({
                    "value_type": property.value_type,
                    "required": property.required.unwrap_or(false),
                    "description": property.description,
                })),
            )
            .await?;

        Ok(created)
    }

    async fn search_repositories(
        &self,
        query: &str,
    ) -> Result<Vec<RepositoryRecord>, MirrorError> {
        let mut results = Vec::new();
        let mut page = 1;
        let mut total;
        let mut incomplete = false;

        loop {
            let params = SearchParams {
                q: query,
                per_page: self.page_size,
                page,
            };
            let response: SearchPage = self
                .client
                .get("/search/repositories", Some(&params))
                .await?;

            let fetched = response.items.len();
            total = response.total_count;
            incomplete |= response.incomplete_results;
            results.extend(response.items);
            tracing::debug!(page, fetched, total, "Fetched search page");

            if fetched < self.page_size as usize || results.len() as u64 >= total {
                break;
            }
            if (page + 1) * self.page_size > SEARCH_RESULT_LIMIT {
                break;
            }
            page += 1;
        }

        if incomplete || (results.len() as u64) < total {
            tracing::warn!(
                query,
                fetched = results.len(),
                total,
                incomplete,
                "Search results are truncated"
            );
        }

        Ok(results)
    }
}
