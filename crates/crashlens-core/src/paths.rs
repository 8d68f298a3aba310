use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CRASHLENS_DIR: &str = ".crashlens";
pub const CONFIG_FILE: &str = ".crashlens/config.yaml";
pub const DEFAULT_DB_FILE: &str = ".crashlens/crashlens.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn crashlens_dir(root: &Path) -> PathBuf {
    root.join(CRASHLENS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured path against the project root.
///
/// Absolute paths are returned unchanged.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
