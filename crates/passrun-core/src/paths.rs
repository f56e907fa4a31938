//! Standard paths used by passrun tools

use std::path::{Path, PathBuf};

/// Environment variable `pass` itself honours for a relocated store
pub const STORE_DIR_ENV: &str = "PASSWORD_STORE_DIR";

/// Standard passrun paths
pub struct Paths {
    /// Config directory (~/.config/passrun)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("passrun");

        Self { config }
    }

    /// Path of the TOML config file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }
}

/// The store root `pass` would use: `$PASSWORD_STORE_DIR`, else `~/.password-store`
pub fn default_store_dir() -> PathBuf {
    match std::env::var_os(STORE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => expand_home(Path::new(&dir)),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".password-store"),
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
