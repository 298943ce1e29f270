mod models;
pub use models::*;

use crate::args::StoreArgs;
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Diagnostic snapshot of the cache state. Read-only.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub expired: bool,
    pub plugin_count: usize,
    pub patch_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub age_days: Option<i64>,
}

/// Durable store for the catalog snapshot and the favorites set.
///
/// All failure paths degrade to an empty or unsaved state and log the
/// condition; nothing here is fatal to the caller.
pub struct CacheService {
    cache_file: PathBuf,
    cache_duration: Duration,
    envelope: CacheEnvelope,
}

impl CacheService {
    pub fn new(cache_file: impl Into<PathBuf>, cache_duration: Duration) -> Self {
        let mut service = Self {
            cache_file: cache_file.into(),
            cache_duration,
            envelope: CacheEnvelope::default(),
        };

        tracing::debug!(
            "Initializing cache service with file {}",
            service.cache_file.display()
        );
        service.load();

        service
    }

    pub fn from_args(args: &StoreArgs) -> Self {
        Self::new(
            &args.cache_file,
            Duration::days(args.cache_max_age_days as i64),
        )
    }

    /// Read the persisted envelope from disk.
    ///
    /// A missing file, malformed content or an expired timestamp all degrade
    /// to an empty envelope and return `false`.
    pub fn load(&mut self) -> bool {
        if !self.cache_file.exists() {
            tracing::info!("No cache file found, starting with empty cache");
            self.envelope = CacheEnvelope::default();
            return false;
        }

        match self.read_envelope() {
            Ok(envelope) => {
                self.envelope = envelope;

                if self.is_expired() {
                    tracing::info!("Cache expired, clearing cache");
                    self.envelope = CacheEnvelope::default();
                    return false;
                }

                tracing::info!(
                    "Cache loaded. Plugins: {}, patches: {}",
                    self.envelope.plugins.len(),
                    self.envelope.patches.len()
                );
                true
            }
            Err(err) => {
                tracing::error!("Error loading cache: {}", err);
                self.envelope = CacheEnvelope::default();
                false
            }
        }
    }

    fn read_envelope(&self) -> Result<CacheEnvelope, StoreError> {
        let data = std::fs::read_to_string(&self.cache_file)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Stamp the envelope with the current time and write it out.
    ///
    /// An I/O failure is logged and reported as `false`; the in-memory
    /// envelope stays valid for the rest of the session either way.
    pub fn save(&mut self) -> bool {
        self.envelope.last_updated = Some(Utc::now());

        let result = serde_json::to_string_pretty(&self.envelope)
            .map_err(StoreError::from)
            .and_then(|data| std::fs::write(&self.cache_file, data).map_err(StoreError::from));

        match result {
            Ok(()) => {
                tracing::info!("Cache saved");
                true
            }
            Err(err) => {
                tracing::error!("Error saving cache: {}", err);
                false
            }
        }
    }

    /// Whether the stored snapshot is too old to trust.
    ///
    /// An envelope that was never saved has no timestamp and counts as
    /// expired. Age exactly equal to the configured duration is expired too.
    pub fn is_expired(&self) -> bool {
        match self.envelope.last_updated {
            None => true,
            Some(last_updated) => Utc::now() - last_updated >= self.cache_duration,
        }
    }

    pub fn plugins(&self) -> &[CatalogItem] {
        &self.envelope.plugins
    }

    pub fn patches(&self) -> &[CatalogItem] {
        &self.envelope.patches
    }

    pub fn set_plugins(&mut self, plugins: Vec<CatalogItem>) {
        tracing::info!("Caching {} plugins", plugins.len());
        self.envelope.plugins = plugins;
    }

    pub fn set_patches(&mut self, patches: Vec<CatalogItem>) {
        tracing::info!("Caching {} patches", patches.len());
        self.envelope.patches = patches;
    }

    /// Apply optional wholesale replacements, then persist.
    ///
    /// The save is attempted even without replacements since this is also the
    /// path used after favorites changes.
    pub fn update(
        &mut self,
        plugins: Option<Vec<CatalogItem>>,
        patches: Option<Vec<CatalogItem>>,
    ) -> bool {
        if let Some(plugins) = plugins {
            self.set_plugins(plugins);
        }

        if let Some(patches) = patches {
            self.set_patches(patches);
        }

        self.save()
    }

    pub fn favorites(&self) -> &BTreeSet<String> {
        &self.envelope.favorites
    }

    pub fn set_favorites(&mut self, favorites: BTreeSet<String>) {
        tracing::info!("Caching {} favorites", favorites.len());
        self.envelope.favorites = favorites;
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.envelope.favorites.contains(name)
    }

    /// Add a name to the favorites and persist immediately. Idempotent.
    pub fn add_favorite(&mut self, name: impl Into<String>) {
        let name = name.into();
        tracing::info!("Adding {} to favorites", name);

        self.envelope.favorites.insert(name);
        self.save();
    }

    /// Remove a name from the favorites and persist immediately.
    ///
    /// Removing a name that is not present is a no-op, but still saves.
    pub fn remove_favorite(&mut self, name: &str) {
        tracing::info!("Removing {} from favorites", name);

        self.envelope.favorites.remove(name);
        self.save();
    }

    pub fn info(&self) -> CacheInfo {
        let last_updated = self.envelope.last_updated;

        CacheInfo {
            path: self.cache_file.clone(),
            exists: self.cache_file.exists(),
            expired: self.is_expired(),
            plugin_count: self.envelope.plugins.len(),
            patch_count: self.envelope.patches.len(),
            last_updated,
            age_days: last_updated.map(|ts| (Utc::now() - ts).num_days()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, kind: ItemKind) -> CatalogItem {
        CatalogItem {
            id: name.len() as u64,
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            stargazers_count: 1,
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            owner: "someone".to_string(),
            kind,
            html_url: format!("https://example.invalid/{}", name),
        }
    }

    fn service_at(dir: &tempfile::TempDir) -> CacheService {
        CacheService::new(dir.path().join("cache.json"), Duration::weeks(4))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_at(&dir);

        assert!(!service.load());
        assert!(service.plugins().is_empty());
        assert!(service.patches().is_empty());
        assert!(service.is_expired());
    }

    #[test]
    fn envelope_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut service = CacheService::new(&path, Duration::weeks(4));
        service.set_favorites(BTreeSet::from(["b".to_string(), "a".to_string()]));
        assert!(service.update(
            Some(vec![
                item("one.koplugin", ItemKind::Plugin),
                item("two.koplugin", ItemKind::Plugin),
            ]),
            Some(vec![item("some-patch", ItemKind::Patch)]),
        ));

        let mut reloaded = CacheService::new(&path, Duration::weeks(4));
        assert!(reloaded.load());
        assert_eq!(reloaded.plugins().len(), 2);
        assert_eq!(reloaded.patches().len(), 1);
        assert_eq!(
            reloaded.favorites(),
            &BTreeSet::from(["a".to_string(), "b".to_string()])
        );
        assert_eq!(reloaded.plugins()[0].name, "one.koplugin");
        assert!(!reloaded.is_expired());
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let mut service = CacheService::new(&path, Duration::weeks(4));
        assert!(!service.load());
        assert!(service.plugins().is_empty());
    }

    #[test]
    fn expiry_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let duration = Duration::weeks(4);

        let write_with_stamp = |stamp: DateTime<Utc>| {
            let envelope = CacheEnvelope {
                last_updated: Some(stamp),
                ..CacheEnvelope::default()
            };
            std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();
        };

        // Exactly at the duration boundary: expired.
        write_with_stamp(Utc::now() - duration);
        let mut service = CacheService::new(&path, duration);
        assert!(!service.load());
        assert!(service.is_expired());

        // One step inside the boundary: still fresh.
        write_with_stamp(Utc::now() - duration + Duration::seconds(5));
        assert!(service.load());
        assert!(!service.is_expired());
    }

    #[test]
    fn favorite_mutation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_at(&dir);

        service.add_favorite("hello.koplugin");
        service.add_favorite("hello.koplugin");
        assert_eq!(service.favorites().len(), 1);
        assert!(service.is_favorite("hello.koplugin"));

        service.remove_favorite("never-added");
        assert_eq!(service.favorites().len(), 1);

        service.remove_favorite("hello.koplugin");
        assert!(service.favorites().is_empty());
    }

    #[test]
    fn favorite_mutation_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut service = CacheService::new(&path, Duration::weeks(4));
        service.add_favorite("hello.koplugin");

        let mut reloaded = CacheService::new(&path, Duration::weeks(4));
        assert!(reloaded.load());
        assert!(reloaded.is_favorite("hello.koplugin"));
    }

    #[test]
    fn save_failure_keeps_envelope_valid() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("cache.json");

        let mut service = CacheService::new(&missing, Duration::weeks(4));
        service.set_plugins(vec![item("one.koplugin", ItemKind::Plugin)]);

        assert!(!service.save());
        assert_eq!(service.plugins().len(), 1);
    }

    #[test]
    fn info_reports_without_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_at(&dir);
        service.update(Some(vec![item("one.koplugin", ItemKind::Plugin)]), None);

        let info = service.info();
        assert!(info.exists);
        assert!(!info.expired);
        assert_eq!(info.plugin_count, 1);
        assert_eq!(info.patch_count, 0);
        assert_eq!(info.age_days, Some(0));
        assert_eq!(service.plugins().len(), 1);
    }
}
