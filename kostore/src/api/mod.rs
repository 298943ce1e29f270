mod models;
pub use models::*;

use crate::args::StoreArgs;
use crate::cache::{CatalogItem, ItemKind};
use crate::error::StoreError;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const PLUGIN_TOPIC: &str = "koreader-plugin";
pub const PLUGIN_NAME_PATTERNS: &[&str] = &["koplugin", "koreader"];

pub const PATCH_TOPIC: &str = "koreader-user-patch";
pub const PATCH_NAME_PATTERNS: &[&str] = &["patch", "patches"];

const SEARCH_PAGE_SIZE: usize = 100;
const MAX_SEARCH_PAGES: usize = 5;

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    token: Option<String>,
    request_semaphore: Arc<Semaphore>,
    base: Url,
}

impl CatalogClient {
    /// Prepare the API client.
    pub fn new(args: &StoreArgs) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .redirect(Policy::limited(10))
            .hickory_dns(true)
            .build()?;

        let request_semaphore = Arc::new(Semaphore::new(args.max_parallel_requests.get()));

        let base = Url::parse("https://api.github.com/").unwrap();

        Ok(Self {
            client,
            token: args.token.clone(),
            request_semaphore,
            base,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_plugins(&self) -> Result<Vec<CatalogItem>, StoreError> {
        self.search_repositories(ItemKind::Plugin, PLUGIN_TOPIC, PLUGIN_NAME_PATTERNS)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_patches(&self) -> Result<Vec<CatalogItem>, StoreError> {
        self.search_repositories(ItemKind::Patch, PATCH_TOPIC, PATCH_NAME_PATTERNS)
            .await
    }

    /// Search by topic, then widen with name-pattern queries whose results
    /// still have to pass the name classification. Deduplicated by id.
    #[tracing::instrument(skip(self))]
    pub async fn search_repositories(
        &self,
        kind: ItemKind,
        topic: &str,
        name_patterns: &[&str],
    ) -> Result<Vec<CatalogItem>, StoreError> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for result in self.search(&format!("topic:{}", topic)).await? {
            if seen.insert(result.id) {
                items.push(result.into_catalog_item(kind));
            }
        }

        for pattern in name_patterns {
            for result in self.search(&format!("{} in:name", pattern)).await? {
                if seen.insert(result.id) && result.looks_like(kind) {
                    items.push(result.into_catalog_item(kind));
                }
            }
        }

        tracing::info!("Catalog search returned {} item(s)", items.len());
        Ok(items)
    }

    async fn search(&self, query: &str) -> Result<Vec<RepoSearchItem>, StoreError> {
        let mut all = Vec::new();

        for page in 1..=MAX_SEARCH_PAGES {
            let permit = self.acquire_permit().await;

            let url = {
                let mut url = self.path(["search", "repositories"]);
                url.query_pairs_mut()
                    .append_pair("q", query)
                    .append_pair("per_page", &SEARCH_PAGE_SIZE.to_string())
                    .append_pair("page", &page.to_string());
                url
            };

            let response = self.request(url).send().await?.error_for_status()?;
            let data = response.bytes().await?;
            drop(permit);

            let results: RepoSearchResults = serde_json::from_slice(&data)?;
            let count = results.items.len();
            all.extend(results.items);

            if count < SEARCH_PAGE_SIZE {
                break;
            }
        }

        Ok(all)
    }

    /// Latest release tag of a repository, if it has any releases.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_latest_release(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        let permit = self.acquire_permit().await;

        let response = self
            .request(self.path(["repos", owner, name, "releases", "latest"]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let data = response.error_for_status()?.bytes().await?;
        drop(permit);

        let release: RepoRelease = serde_json::from_slice(&data)?;
        Ok(Some(release.tag_name))
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
    }

    fn path(&self, segments: impl IntoIterator<Item = impl AsRef<str>>) -> Url {
        let mut new_path = self.base.clone();
        new_path.path_segments_mut().unwrap().extend(segments);

        new_path
    }

    #[tracing::instrument(skip(self))]
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        self.request_semaphore
            .clone()
            .acquire_owned()
            .await
            .unwrap()
    }
}
