use std::collections::BTreeMap;
use std::path::Path;

/// Sentinel for versions that cannot be determined. Items carrying it are
/// never considered updatable since there is nothing to compare against.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Installed plugins live in directories named `<plugin>.koplugin`.
pub const PLUGIN_DIR_SUFFIX: &str = ".koplugin";

const PLUGINS_DIR: &str = "plugins";
const PLUGIN_META_FILE: &str = "_meta.lua";

/// Point-in-time snapshot of the add-ons present on a device, keyed by name.
///
/// Refresh by re-scanning whenever the device root changes or an install
/// completes.
#[derive(Debug, Clone, Default)]
pub struct InstalledInventory {
    items: BTreeMap<String, String>,
}

impl InstalledInventory {
    /// Snapshot the add-ons installed under a device root.
    ///
    /// Pure reads; a missing plugins directory yields an empty inventory.
    pub fn scan(device_root: impl AsRef<Path>) -> Self {
        let plugins_dir = device_root.as_ref().join(PLUGINS_DIR);

        let Ok(entries) = std::fs::read_dir(&plugins_dir) else {
            tracing::info!("No plugins directory at {}", plugins_dir.display());
            return Self::default();
        };

        let mut items = BTreeMap::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            let version =
                read_meta_version(&path).unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            items.insert(name.to_string(), version);
        }

        tracing::info!("Found {} installed add-on(s)", items.len());
        Self { items }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(String::as_str)
    }

    pub fn items(&self) -> &BTreeMap<String, String> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<BTreeMap<String, String>> for InstalledInventory {
    fn from(items: BTreeMap<String, String>) -> Self {
        Self { items }
    }
}

/// Pull the version out of a plugin's `_meta.lua`, e.g. `version = "1.2"`.
fn read_meta_version(plugin_dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(plugin_dir.join(PLUGIN_META_FILE)).ok()?;

    for line in content.lines() {
        let Some(rest) = line.trim().strip_prefix("version") else {
            continue;
        };

        let Some(rest) = rest.trim_start().strip_prefix('=') else {
            continue;
        };

        let value = rest
            .trim()
            .trim_end_matches(',')
            .trim_matches(|c| c == '"' || c == '\'');

        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn plugin_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(PLUGINS_DIR).join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_plugins_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let inventory = InstalledInventory::scan(dir.path());
        assert!(inventory.is_empty());
    }

    #[test]
    fn scan_picks_up_plugin_directories() {
        let dir = tempfile::tempdir().unwrap();
        plugin_dir(dir.path(), "hello.koplugin");
        plugin_dir(dir.path(), "goodbye.koplugin");

        // Stray files are not plugins.
        fs::write(dir.path().join(PLUGINS_DIR).join("notes.txt"), "").unwrap();

        let inventory = InstalledInventory::scan(dir.path());
        assert_eq!(inventory.len(), 2);
        assert!(inventory.contains("hello.koplugin"));
        assert!(inventory.contains("goodbye.koplugin"));
        assert!(!inventory.contains("notes.txt"));
    }

    #[test]
    fn version_read_from_meta_file() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = plugin_dir(dir.path(), "hello.koplugin");
        fs::write(
            plugin.join(PLUGIN_META_FILE),
            "local _ = {}\nversion = \"1.2.3\",\nreturn _\n",
        )
        .unwrap();

        let inventory = InstalledInventory::scan(dir.path());
        assert_eq!(inventory.version_of("hello.koplugin"), Some("1.2.3"));
    }

    #[test]
    fn missing_version_falls_back_to_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        plugin_dir(dir.path(), "hello.koplugin");

        let inventory = InstalledInventory::scan(dir.path());
        assert_eq!(inventory.version_of("hello.koplugin"), Some(UNKNOWN_VERSION));
    }
}
