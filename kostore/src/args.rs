use crate::cache::ItemKind;
use crate::reconcile::{CategoryFilter, SortOrder, StatusFilter};
use clap::{Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
pub struct StoreArgs {
    #[arg(
        short,
        long,
        default_value = "koreader_store_cache.json",
        env = "KOSTORE_CACHE_FILE"
    )]
    pub cache_file: PathBuf,

    /// Catalog snapshots older than this are treated as absent.
    #[arg(long, default_value = "28", env = "KOSTORE_CACHE_MAX_AGE_DAYS")]
    pub cache_max_age_days: u32,

    /// Device root to use instead of probing. Trusted as-is.
    #[arg(short, long, env = "KOSTORE_DEVICE")]
    pub device: Option<PathBuf>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, default_value = "8")]
    pub max_parallel_requests: NonZeroUsize,

    #[command(subcommand)]
    pub command: StoreCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum StoreCommand {
    /// Show the catalog with installed/favorite/update badges.
    List {
        #[arg(long, value_enum, default_value_t = ItemKind::Plugin)]
        kind: ItemKind,

        /// Case-insensitive match against name or description.
        #[arg(short, long, default_value = "")]
        query: String,

        #[arg(long, value_enum, default_value_t = CategoryFilter::All)]
        category: CategoryFilter,

        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,

        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// Refetch the catalog even if the cache is still fresh.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Recompute update eligibility before rendering.
        #[arg(long, default_value_t = false)]
        check_updates: bool,
    },

    /// Force a catalog refetch into the cache.
    Refresh,

    /// Mark an item as a favorite.
    Favorite { name: String },

    /// Remove an item from the favorites.
    Unfavorite { name: String },

    /// Recompute the update map and report updatable items.
    CheckUpdates,

    /// Print a cache diagnostic snapshot.
    Info,

    /// Probe for connected devices and report on them.
    Device,
}
