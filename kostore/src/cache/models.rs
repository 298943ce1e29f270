use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Plugin,
    Patch,
}

/// One remote add-on descriptor. Replaced wholesale on every catalog refresh.
///
/// Names are only unique within a kind; `id` is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub stargazers_count: u64,

    /// ISO-8601, may be empty when the repository never reported one.
    #[serde(default)]
    pub updated_at: String,

    pub owner: String,
    pub kind: ItemKind,
    pub html_url: String,
}

/// The single persisted document: catalog snapshot, favorites and freshness stamp.
///
/// `last_updated` is only `None` for an envelope that has never been saved,
/// which always counts as expired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEnvelope {
    #[serde(default)]
    pub plugins: Vec<CatalogItem>,

    #[serde(default)]
    pub patches: Vec<CatalogItem>,

    #[serde(default)]
    pub favorites: BTreeSet<String>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}
