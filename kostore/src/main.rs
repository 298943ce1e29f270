mod api;
mod args;
mod cache;
mod device;
mod error;
mod inventory;
mod reconcile;
mod updates;

use crate::api::CatalogClient;
use crate::args::{StoreArgs, StoreCommand};
use crate::cache::{CacheInfo, CacheService, CatalogItem, ItemKind};
use crate::device::Detection;
use crate::error::StoreError;
use crate::inventory::{InstalledInventory, UNKNOWN_VERSION};
use crate::reconcile::{ItemQuery, ReconcileContext};
use chrono::Utc;
use clap::Parser as _;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

fn main() {
    let indicatif_layer = tracing_indicatif::IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_env("KOSTORE_LOG"))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let args = StoreArgs::parse();

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(v) => v.block_on(async_main(args)),
        Err(err) => {
            tracing::error!("Failed to create tokio runtime: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        tracing::error!("Error: {:?}", err);
        std::process::exit(1);
    }
}

async fn async_main(args: StoreArgs) -> Result<(), StoreError> {
    tracing::trace!("args = {:#?}", args);

    let mut cache = CacheService::from_args(&args);

    match args.command.clone() {
        StoreCommand::List {
            kind,
            query,
            category,
            status,
            sort,
            refresh,
            check_updates,
        } => {
            let query = ItemQuery {
                text: query,
                category,
                status,
                sort,
            };

            run_list(&args, &mut cache, kind, query, refresh, check_updates).await
        }
        StoreCommand::Refresh => refresh_catalog(&args, &mut cache).await,
        StoreCommand::Favorite { name } => {
            warn_if_unknown_name(&cache, &name);

            if cache.is_favorite(&name) {
                println!("'{}' is already a favorite.", name);
            } else {
                println!("Added '{}' to favorites.", name);
            }

            // Idempotent either way; persists immediately.
            cache.add_favorite(name.as_str());
            Ok(())
        }
        StoreCommand::Unfavorite { name } => {
            cache.remove_favorite(&name);
            println!("Removed '{}' from favorites.", name);
            Ok(())
        }
        StoreCommand::CheckUpdates => run_check_updates(&args, &mut cache).await,
        StoreCommand::Info => {
            print_cache_info(&cache.info());
            Ok(())
        }
        StoreCommand::Device => {
            run_device_report(&args);
            Ok(())
        }
    }
}

async fn run_list(
    args: &StoreArgs,
    cache: &mut CacheService,
    kind: ItemKind,
    query: ItemQuery,
    refresh: bool,
    check_updates: bool,
) -> Result<(), StoreError> {
    let inventory = resolve_device_root(args)
        .map(InstalledInventory::scan)
        .unwrap_or_default();

    ensure_catalog(args, cache, refresh).await?;

    let updates = if check_updates && !inventory.is_empty() {
        let client = CatalogClient::new(args)?;
        updates::check_for_updates(&client, &inventory, cache.plugins()).await
    } else {
        HashMap::new()
    };

    let items = match kind {
        ItemKind::Plugin => cache.plugins(),
        ItemKind::Patch => cache.patches(),
    };

    let ctx = ReconcileContext {
        inventory: &inventory,
        favorites: cache.favorites(),
        updates: &updates,
    };

    let visible = reconcile::filter_items(items, &query, &ctx, Utc::now());
    print_items(&visible, &ctx);

    Ok(())
}

async fn run_check_updates(args: &StoreArgs, cache: &mut CacheService) -> Result<(), StoreError> {
    let Some(device_root) = resolve_device_root(args) else {
        println!("No device connected; nothing to check.");
        return Ok(());
    };

    let inventory = InstalledInventory::scan(&device_root);
    if inventory.is_empty() {
        println!(
            "No installed add-ons found under {}",
            device_root.display()
        );
        return Ok(());
    }

    ensure_catalog(args, cache, false).await?;

    let client = CatalogClient::new(args)?;
    let updates = updates::check_for_updates(&client, &inventory, cache.plugins()).await;

    let mut eligible: Vec<_> = updates
        .iter()
        .filter(|(_, record)| record.eligible)
        .collect();
    eligible.sort_by(|a, b| a.0.cmp(b.0));

    if eligible.is_empty() {
        println!("All installed add-ons are up to date.");
    } else {
        println!("Updates available for {} add-on(s):", eligible.len());
        for (name, record) in eligible {
            println!(
                "- {}: {} -> {}",
                name, record.installed_version, record.available_version
            );
        }
    }

    Ok(())
}

/// Make sure the cache holds a usable catalog, fetching when it is absent,
/// expired or a refresh was forced.
async fn ensure_catalog(
    args: &StoreArgs,
    cache: &mut CacheService,
    force_refresh: bool,
) -> Result<(), StoreError> {
    if !force_refresh && !cache.is_expired() {
        tracing::info!("Using cached catalog data");
        return Ok(());
    }

    refresh_catalog(args, cache).await
}

async fn refresh_catalog(args: &StoreArgs, cache: &mut CacheService) -> Result<(), StoreError> {
    let client = CatalogClient::new(args)?;

    tracing::info!("Fetching catalog from GitHub...");
    let (plugins, patches) = futures::try_join!(client.fetch_plugins(), client.fetch_patches())?;

    tracing::info!(
        "Fetched {} plugins and {} patches",
        plugins.len(),
        patches.len()
    );
    cache.update(Some(plugins), Some(patches));

    Ok(())
}

/// Resolve the device root to work against.
///
/// A manually supplied path wins and is trusted outright. Otherwise a
/// detection pass runs; ambiguity is reported back instead of auto-picking.
fn resolve_device_root(args: &StoreArgs) -> Option<PathBuf> {
    if let Some(manual) = &args.device {
        tracing::info!("Using manually selected device root {}", manual.display());
        return Some(manual.clone());
    }

    match device::detect() {
        Detection::None => None,
        Detection::Single(path) => Some(path),
        Detection::Multiple(paths) => {
            tracing::warn!("Multiple devices found, pass --device to choose one:");
            for path in &paths {
                tracing::warn!("- {}", path.display());
            }
            None
        }
    }
}

fn warn_if_unknown_name(cache: &CacheService, name: &str) {
    let known = cache
        .plugins()
        .iter()
        .chain(cache.patches().iter())
        .any(|item| item.name == name);

    if !known {
        tracing::warn!("'{}' is not in the cached catalog", name);
    }
}

fn print_items(items: &[&CatalogItem], ctx: &ReconcileContext<'_>) {
    if items.is_empty() {
        println!("No items match the current view.");
        return;
    }

    for item in items {
        let facts = ctx.facts(item);

        let mut badges = Vec::new();
        if facts.installed {
            match ctx.inventory.version_of(&item.name) {
                Some(version) if version != UNKNOWN_VERSION => {
                    badges.push(format!("installed {}", version))
                }
                _ => badges.push("installed".to_string()),
            }
        }
        if facts.favorite {
            badges.push("favorite".to_string());
        }
        if facts.update_available {
            badges.push("update available".to_string());
        }

        let badges = if badges.is_empty() {
            String::new()
        } else {
            format!(" [{}]", badges.join(", "))
        };

        println!("{} ({} stars){}", item.name, item.stargazers_count, badges);
        if let Some(description) = &item.description {
            println!("    {}", description);
        }
        println!(
            "    {} | updated {}",
            item.html_url,
            if item.updated_at.is_empty() {
                "unknown"
            } else {
                &item.updated_at
            }
        );
    }

    println!();
    println!("{} item(s)", items.len());
}

fn print_cache_info(info: &CacheInfo) {
    println!("Cache file:   {}", info.path.display());
    println!("Exists:       {}", if info.exists { "yes" } else { "no" });
    println!("Expired:      {}", if info.expired { "yes" } else { "no" });
    println!("Plugins:      {}", info.plugin_count);
    println!("Patches:      {}", info.patch_count);

    match info.last_updated {
        Some(last_updated) => {
            println!("Last updated: {}", last_updated.format("%Y-%m-%d %H:%M:%S"));
            if let Some(age) = info.age_days {
                println!("Age:          {} day(s)", age);
            }
        }
        None => println!("Last updated: never"),
    }
}

fn run_device_report(args: &StoreArgs) {
    let root = if let Some(manual) = &args.device {
        Some(manual.clone())
    } else {
        match device::detect() {
            Detection::None => {
                println!("No device detected.");
                None
            }
            Detection::Single(path) => Some(path),
            Detection::Multiple(paths) => {
                println!("Multiple candidate devices found:");
                for path in &paths {
                    println!("- {}", path.display());
                }
                println!("Re-run with --device to choose one.");
                None
            }
        }
    };

    let Some(root) = root else {
        return;
    };

    let info = device::device_info(&root);
    println!("Device root:  {}", info.path.display());
    println!("Valid:        {}", if info.valid { "yes" } else { "no" });
    println!("Version:      {}", info.version);
    println!(
        "Plugins dir:  {}",
        if info.plugins_dir_exists {
            "present"
        } else {
            "missing"
        }
    );
    println!(
        "Patches dir:  {}",
        if info.patches_dir_exists {
            "present"
        } else {
            "missing"
        }
    );
}
