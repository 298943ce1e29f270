use crate::cache::CatalogItem;
use crate::inventory::{InstalledInventory, PLUGIN_DIR_SUFFIX, UNKNOWN_VERSION};
use crate::updates::UpdateRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

pub const TOP_RATED_MIN_STARS: u64 = 50;
pub const RECENTLY_UPDATED_MAX_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CategoryFilter {
    #[default]
    All,
    TopRated,
    RecentlyUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Favorites,
    Installed,
    NotInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    Stars,
    Updated,
    Name,
}

/// The active view selectors. No sort preserves catalog order.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub text: String,
    pub category: CategoryFilter,
    pub status: StatusFilter,
    pub sort: Option<SortOrder>,
}

/// Everything the view derivation needs, passed explicitly so it stays a
/// pure function of its inputs.
pub struct ReconcileContext<'a> {
    pub inventory: &'a InstalledInventory,
    pub favorites: &'a BTreeSet<String>,
    pub updates: &'a HashMap<String, UpdateRecord>,
}

/// Per-item display facts derived from catalog, inventory, favorites and the
/// update map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFacts {
    pub installed: bool,
    pub favorite: bool,
    pub update_available: bool,
}

impl ReconcileContext<'_> {
    pub fn facts(&self, item: &CatalogItem) -> ItemFacts {
        let installed = self.inventory.contains(&item.name);

        ItemFacts {
            installed,
            favorite: self.favorites.contains(&item.name),
            update_available: installed && self.update_available(&item.name),
        }
    }

    fn update_available(&self, name: &str) -> bool {
        // Exact name first, then the installed directory naming convention.
        let record = self.updates.get(name).or_else(|| {
            name.strip_suffix(PLUGIN_DIR_SUFFIX)
                .and_then(|clean| self.updates.get(clean))
        });

        // An unknown installed version leaves nothing to compare against.
        record.is_some_and(|record| record.installed_version != UNKNOWN_VERSION)
    }
}

/// Apply text, category and status filters in order, then the optional
/// stable sort.
pub fn filter_items<'a>(
    items: &'a [CatalogItem],
    query: &ItemQuery,
    ctx: &ReconcileContext<'_>,
    now: DateTime<Utc>,
) -> Vec<&'a CatalogItem> {
    let text = query.text.to_lowercase();

    let mut filtered: Vec<&CatalogItem> = items
        .iter()
        .filter(|item| matches_text(item, &text))
        .filter(|item| matches_category(item, query.category, now))
        .filter(|item| matches_status(ctx.facts(item), query.status))
        .collect();

    match query.sort {
        Some(SortOrder::Stars) => {
            filtered.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count))
        }
        // The timestamps are fixed-format ISO-8601, so lexicographic order
        // is chronological order.
        Some(SortOrder::Updated) => filtered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        Some(SortOrder::Name) => filtered.sort_by_key(|item| item.name.to_lowercase()),
        None => {}
    }

    filtered
}

fn matches_text(item: &CatalogItem, text: &str) -> bool {
    if text.is_empty() {
        return true;
    }

    item.name.to_lowercase().contains(text)
        || item
            .description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(text)
}

fn matches_category(item: &CatalogItem, category: CategoryFilter, now: DateTime<Utc>) -> bool {
    match category {
        CategoryFilter::All => true,
        CategoryFilter::TopRated => item.stargazers_count >= TOP_RATED_MIN_STARS,
        CategoryFilter::RecentlyUpdated => {
            // A missing or unparsable timestamp fails closed.
            let Ok(updated) = DateTime::parse_from_rfc3339(&item.updated_at) else {
                return false;
            };

            (now - updated.with_timezone(&Utc)).num_days() <= RECENTLY_UPDATED_MAX_DAYS
        }
    }
}

fn matches_status(facts: ItemFacts, status: StatusFilter) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Favorites => facts.favorite,
        StatusFilter::Installed => facts.installed,
        StatusFilter::NotInstalled => !facts.installed,
    }
}
