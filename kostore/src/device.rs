use crate::inventory::UNKNOWN_VERSION;
use std::path::{Path, PathBuf};

/// Name of the directory the firmware lives in on every supported device.
pub const FIRMWARE_DIR_NAME: &str = "koreader";

const LAUNCHER_SCRIPT: &str = "koreader.sh";
const SETTINGS_FILE: &str = "settings.reader.lua";
const VERSION_FILE: &str = "git-rev";

/// Entries that must all exist for a path to count as a full installation.
const ESSENTIAL_ENTRIES: [&str; 4] = [LAUNCHER_SCRIPT, "frontend", "plugins", "data"];

/// Outcome of a detection pass. Ambiguity is surfaced, never resolved here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    None,
    Single(PathBuf),
    Multiple(Vec<PathBuf>),
}

impl Detection {
    fn from_candidates(mut candidates: Vec<PathBuf>) -> Self {
        match candidates.len() {
            0 => Detection::None,
            1 => Detection::Single(candidates.remove(0)),
            _ => Detection::Multiple(candidates),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub valid: bool,
    pub version: String,
    pub plugins_dir_exists: bool,
    pub patches_dir_exists: bool,
}

/// Probe the filesystem for firmware installations.
///
/// Never cached: removable devices can appear and disappear between calls.
pub fn detect() -> Detection {
    tracing::info!("Starting automatic device detection");

    let detection = Detection::from_candidates(candidate_paths());

    match &detection {
        Detection::None => tracing::warn!("No device detected"),
        Detection::Single(path) => {
            tracing::info!("Detected single device at {}", path.display())
        }
        Detection::Multiple(paths) => {
            tracing::info!("Multiple devices found: {:?}", paths)
        }
    }

    detection
}

/// Cheap two-step existence check: launcher script first, then the settings
/// file that is present on all devices.
pub fn is_marker_present(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();

    path.join(LAUNCHER_SCRIPT).exists() || path.join(SETTINGS_FILE).exists()
}

/// Strict check used to confirm a manually chosen path, requiring every
/// essential top-level entry to exist.
pub fn validate_installation(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();

    if !path.exists() {
        return false;
    }

    for entry in ESSENTIAL_ENTRIES {
        if !path.join(entry).exists() {
            tracing::debug!("Missing essential entry {} in {}", entry, path.display());
            return false;
        }
    }

    tracing::info!("Validated installation at {}", path.display());
    true
}

/// Enrich a confirmed path with version and directory facts.
///
/// The version marker is read best-effort; a missing or unreadable file
/// leaves the version at the unknown sentinel.
pub fn device_info(path: impl Into<PathBuf>) -> DeviceInfo {
    let path = path.into();
    let valid = validate_installation(&path);

    let version_file = path.join(VERSION_FILE);
    let version = if version_file.exists() {
        match std::fs::read_to_string(&version_file) {
            Ok(version) => version.trim().to_string(),
            Err(err) => {
                tracing::warn!("Could not read version file: {}", err);
                UNKNOWN_VERSION.to_string()
            }
        }
    } else {
        UNKNOWN_VERSION.to_string()
    };

    DeviceInfo {
        valid,
        version,
        plugins_dir_exists: path.join("plugins").is_dir(),
        patches_dir_exists: path.join("patches").is_dir(),
        path,
    }
}

/// Platform-specific enumeration of marker-bearing firmware directories.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    collect_windows_candidates(&mut paths);

    #[cfg(target_os = "macos")]
    collect_macos_candidates(&mut paths);

    #[cfg(target_os = "linux")]
    collect_linux_candidates(&mut paths);

    tracing::info!("Found candidate paths: {:?}", paths);
    paths
}

#[cfg(target_os = "windows")]
fn collect_windows_candidates(paths: &mut Vec<PathBuf>) {
    const DRIVE_LETTERS: [&str; 22] = [
        "E:", "F:", "G:", "H:", "I:", "J:", "K:", "L:", "M:", "N:", "O:", "P:", "Q:", "R:", "S:",
        "T:", "U:", "V:", "W:", "X:", "Y:", "Z:",
    ];

    // Subfolder conventions of the common e-reader vendors, plus the root.
    const SEARCH_LOCATIONS: [&str; 6] = [
        ".adds",
        "extensions",
        "documents",
        ".kobo",
        "applications",
        "",
    ];

    for drive in DRIVE_LETTERS {
        let drive = PathBuf::from(format!("{}\\", drive));
        if !drive.exists() {
            continue;
        }

        for location in SEARCH_LOCATIONS {
            let base = if location.is_empty() {
                drive.clone()
            } else {
                drive.join(location)
            };

            push_if_marked(paths, base.join(FIRMWARE_DIR_NAME));
        }
    }

    let local_paths = [
        dirs::home_dir().map(|home| home.join(FIRMWARE_DIR_NAME)),
        Some(PathBuf::from("C:/koreader")),
        Some(PathBuf::from("C:/Program Files/koreader")),
        Some(PathBuf::from("C:/Program Files (x86)/koreader")),
    ];

    for local in local_paths.into_iter().flatten() {
        push_if_marked(paths, local);
    }
}

#[cfg(target_os = "macos")]
fn collect_macos_candidates(paths: &mut Vec<PathBuf>) {
    let mac_paths = [
        Some(PathBuf::from("/Volumes/koreader")),
        Some(PathBuf::from("/Volumes/KOReader")),
        dirs::home_dir().map(|home| home.join(FIRMWARE_DIR_NAME)),
        Some(PathBuf::from("/Applications/koreader")),
    ];

    for path in mac_paths.into_iter().flatten() {
        push_if_marked(paths, path);
    }
}

#[cfg(target_os = "linux")]
fn collect_linux_candidates(paths: &mut Vec<PathBuf>) {
    for mount_base in ["/media", "/mnt"] {
        for candidate in mounted_candidates(Path::new(mount_base)) {
            push_if_marked(paths, candidate);
        }
    }

    let fixed_paths = [
        dirs::home_dir().map(|home| home.join(FIRMWARE_DIR_NAME)),
        Some(PathBuf::from("/opt/koreader")),
    ];

    for path in fixed_paths.into_iter().flatten() {
        push_if_marked(paths, path);
    }
}

/// One-level scan below a mount base, e.g. `/media/<user>/koreader`.
#[cfg(any(target_os = "linux", test))]
fn mounted_candidates(mount_base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(mount_base) else {
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path().join(FIRMWARE_DIR_NAME))
        .filter(|candidate| candidate.is_dir())
        .collect()
}

fn push_if_marked(paths: &mut Vec<PathBuf>, candidate: PathBuf) {
    if candidate.is_dir() && is_marker_present(&candidate) {
        paths.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    fn fake_installation(root: &Path) {
        fs::create_dir_all(root).unwrap();
        touch(&root.join(LAUNCHER_SCRIPT));
        fs::create_dir(root.join("frontend")).unwrap();
        fs::create_dir(root.join("plugins")).unwrap();
        fs::create_dir(root.join("data")).unwrap();
    }

    #[test]
    fn marker_accepts_launcher_script() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(LAUNCHER_SCRIPT));

        assert!(is_marker_present(dir.path()));
    }

    #[test]
    fn marker_falls_back_to_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(SETTINGS_FILE));

        assert!(is_marker_present(dir.path()));
    }

    #[test]
    fn marker_rejects_unrelated_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("random.txt"));

        assert!(!is_marker_present(dir.path()));
    }

    #[test]
    fn validation_requires_every_essential_entry() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(FIRMWARE_DIR_NAME);
        fake_installation(&root);

        assert!(validate_installation(&root));

        fs::remove_dir(root.join("data")).unwrap();
        assert!(!validate_installation(&root));
    }

    #[test]
    fn validation_rejects_missing_path() {
        assert!(!validate_installation("/definitely/not/a/device"));
    }

    #[test]
    fn detection_cardinality() {
        assert_eq!(Detection::from_candidates(vec![]), Detection::None);

        assert_eq!(
            Detection::from_candidates(vec![PathBuf::from("/a")]),
            Detection::Single(PathBuf::from("/a"))
        );

        // More than one candidate defers the choice to the caller.
        assert_eq!(
            Detection::from_candidates(vec![PathBuf::from("/a"), PathBuf::from("/b")]),
            Detection::Multiple(vec![PathBuf::from("/a"), PathBuf::from("/b")])
        );
    }

    #[test]
    fn mounted_candidates_scans_one_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sdcard").join(FIRMWARE_DIR_NAME)).unwrap();
        fs::create_dir_all(dir.path().join("other-stick")).unwrap();

        let found = mounted_candidates(dir.path());
        assert_eq!(
            found,
            vec![dir.path().join("sdcard").join(FIRMWARE_DIR_NAME)]
        );
    }

    #[test]
    fn mounted_candidates_handles_missing_base() {
        assert!(mounted_candidates(Path::new("/no/such/mount/base")).is_empty());
    }

    #[test]
    fn device_info_reads_version_marker() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(FIRMWARE_DIR_NAME);
        fake_installation(&root);
        fs::write(root.join(VERSION_FILE), "v2024.11-50\n").unwrap();

        let info = device_info(&root);
        assert!(info.valid);
        assert_eq!(info.version, "v2024.11-50");
        assert!(info.plugins_dir_exists);
        assert!(!info.patches_dir_exists);
    }

    #[test]
    fn device_info_missing_version_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(FIRMWARE_DIR_NAME);
        fake_installation(&root);

        let info = device_info(&root);
        assert!(info.valid);
        assert_eq!(info.version, UNKNOWN_VERSION);
    }
}
