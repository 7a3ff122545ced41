//! Location of the settings file.
//!
//! Functions accept `&Path` so callers can point at any directory (tests,
//! `--config`); only [`default_config_dir`] consults the OS.

use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "dashboard-dispatch";
pub const SETTINGS_FILE: &str = "dispatch.json";

/// `<os config dir>/dashboard-dispatch`, or `./.dashboard-dispatch` when the
/// OS reports no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from(format!(".{APP_DIR}")), |d| d.join(APP_DIR))
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}
