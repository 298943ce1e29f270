use crate::api::CatalogClient;
use crate::cache::CatalogItem;
use crate::inventory::{InstalledInventory, PLUGIN_DIR_SUFFIX, UNKNOWN_VERSION};
use semver::Version;
use std::collections::HashMap;

/// Point-in-time update fact for one installed item, keyed by catalog name.
///
/// Not re-derived automatically; recompute after the inventory or the catalog
/// changes.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub installed_version: String,
    pub available_version: String,
    pub eligible: bool,
}

/// Compare the installed inventory against the catalog's released versions.
///
/// Caller-triggered only. A record is kept when the remote side is newer, or
/// when the installed version is unknown and no comparison is possible.
pub async fn check_for_updates(
    client: &CatalogClient,
    inventory: &InstalledInventory,
    catalog: &[CatalogItem],
) -> HashMap<String, UpdateRecord> {
    let mut updates = HashMap::new();

    for (installed_name, installed_version) in inventory.items() {
        let Some(item) = find_catalog_entry(catalog, installed_name) else {
            continue;
        };

        let available_version = match client.fetch_latest_release(&item.owner, &item.name).await {
            Ok(Some(tag)) => tag,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!("Could not resolve latest release for {}: {}", item.name, err);
                continue;
            }
        };

        let record = build_record(installed_version, available_version);
        if record.eligible || record.installed_version == UNKNOWN_VERSION {
            updates.insert(item.name.clone(), record);
        }
    }

    tracing::info!("Update check produced {} record(s)", updates.len());
    updates
}

fn build_record(installed_version: &str, available_version: String) -> UpdateRecord {
    let eligible = installed_version != UNKNOWN_VERSION
        && is_newer(&available_version, installed_version);

    UpdateRecord {
        installed_version: installed_version.to_string(),
        available_version,
        eligible,
    }
}

fn find_catalog_entry<'a>(
    catalog: &'a [CatalogItem],
    installed_name: &str,
) -> Option<&'a CatalogItem> {
    catalog
        .iter()
        .find(|item| matches_installed(&item.name, installed_name))
}

/// Exact match, or a match across the installed directory naming convention
/// in either direction.
fn matches_installed(item_name: &str, installed_name: &str) -> bool {
    item_name == installed_name
        || item_name.strip_suffix(PLUGIN_DIR_SUFFIX) == Some(installed_name)
        || installed_name.strip_suffix(PLUGIN_DIR_SUFFIX) == Some(item_name)
}

fn is_newer(available: &str, installed: &str) -> bool {
    match (parse_version(available), parse_version(installed)) {
        (Some(available), Some(installed)) => available > installed,
        // Without two parsable versions, any difference counts as an update.
        _ => available != installed,
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_comparison_when_both_parse() {
        assert!(is_newer("1.2.0", "1.1.9"));
        assert!(is_newer("v2.0.0", "1.9.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("0.9.0", "1.0.0"));
    }

    #[test]
    fn string_inequality_when_versions_do_not_parse() {
        assert!(is_newer("2024.11", "2024.04"));
        assert!(!is_newer("2024.11", "2024.11"));
    }

    #[test]
    fn unknown_installed_version_is_never_eligible() {
        let record = build_record(UNKNOWN_VERSION, "9.9.9".to_string());
        assert!(!record.eligible);
    }

    #[test]
    fn newer_release_is_eligible() {
        let record = build_record("1.0.0", "1.1.0".to_string());
        assert!(record.eligible);

        let record = build_record("1.1.0", "1.1.0".to_string());
        assert!(!record.eligible);
    }

    #[test]
    fn name_matching_crosses_the_directory_suffix() {
        assert!(matches_installed("hello.koplugin", "hello.koplugin"));
        assert!(matches_installed("hello.koplugin", "hello"));
        assert!(matches_installed("hello", "hello.koplugin"));
        assert!(!matches_installed("hello", "goodbye"));
    }
}
