use crate::cache::{CatalogItem, ItemKind};
use crate::inventory::PLUGIN_DIR_SUFFIX;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSearchResults {
    #[serde(default)]
    pub items: Vec<RepoSearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSearchItem {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,

    #[serde(default)]
    pub stargazers_count: u64,

    #[serde(default)]
    pub updated_at: Option<String>,

    pub owner: RepoOwner,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoRelease {
    pub tag_name: String,
}

impl RepoSearchItem {
    /// Name-based classification for results that did not come in via a
    /// topic search.
    pub fn looks_like(&self, kind: ItemKind) -> bool {
        let name = self.name.to_lowercase();

        match kind {
            ItemKind::Plugin => name.ends_with(PLUGIN_DIR_SUFFIX) || name.contains("koreader"),
            ItemKind::Patch => name.contains("patch"),
        }
    }

    pub fn into_catalog_item(self, kind: ItemKind) -> CatalogItem {
        CatalogItem {
            id: self.id,
            name: self.name,
            description: self.description,
            stargazers_count: self.stargazers_count,
            updated_at: self.updated_at.unwrap_or_default(),
            owner: self.owner.login,
            kind,
            html_url: self.html_url,
        }
    }
}
