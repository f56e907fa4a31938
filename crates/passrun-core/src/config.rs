//! Configuration loading for passrun
//!
//! Read from `~/.config/passrun/config.toml`. Every field has a default, so a
//! missing file (or a file with only a few keys) is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::{self, Paths};

/// Placeholder in `decrypt.args` replaced with the entry name
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

/// passrun configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Password store root
    #[serde(default = "paths::default_store_dir")]
    pub store_dir: PathBuf,

    /// Maximum matches returned for a search term
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum matches returned when listing everything (empty search term)
    #[serde(default = "default_max_results_list_all")]
    pub max_results_list_all: usize,

    #[serde(default)]
    pub decrypt: DecryptConfig,

    #[serde(default)]
    pub clipboard: ClipboardConfig,

    #[serde(default)]
    pub typing: TypingConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub rpc: RpcConfig,
}

fn default_max_results() -> usize {
    10
}

fn default_max_results_list_all() -> usize {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: paths::default_store_dir(),
            max_results: default_max_results(),
            max_results_list_all: default_max_results_list_all(),
            decrypt: DecryptConfig::default(),
            clipboard: ClipboardConfig::default(),
            typing: TypingConfig::default(),
            notify: NotifyConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

/// How an entry is decrypted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptConfig {
    /// The command to run
    #[serde(default = "default_decrypt_command")]
    pub command: String,

    /// Arguments (use {entry} as placeholder)
    #[serde(default = "default_decrypt_args")]
    pub args: Vec<String>,

    /// Upper bound on one decryption, pinentry prompt included
    #[serde(default = "default_decrypt_timeout")]
    pub timeout_secs: u64,

    /// Only the first line of the decrypted file is the password
    #[serde(default = "default_true")]
    pub first_line_only: bool,
}

fn default_decrypt_command() -> String {
    "pass".to_string()
}

fn default_decrypt_args() -> Vec<String> {
    vec!["show".to_string(), ENTRY_PLACEHOLDER.to_string()]
}

fn default_decrypt_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            command: default_decrypt_command(),
            args: default_decrypt_args(),
            timeout_secs: default_decrypt_timeout(),
            first_line_only: true,
        }
    }
}

impl DecryptConfig {
    /// Arguments for one entry, placeholder substituted
    pub fn args_for(&self, entry: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                if arg == ENTRY_PLACEHOLDER {
                    entry.to_string()
                } else {
                    arg.clone()
                }
            })
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Clipboard delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Clear the clipboard this many seconds after a copy, if it still holds
    /// the copied password. Unset disables clearing.
    #[serde(default)]
    pub clear_after_secs: Option<u64>,

    /// Override the copy command (reads the value on stdin)
    #[serde(default)]
    pub copy_command: Option<Vec<String>>,

    /// Override the paste command (prints the clipboard on stdout)
    #[serde(default)]
    pub paste_command: Option<Vec<String>>,

    /// Override the clear command; unset means "copy an empty value"
    #[serde(default)]
    pub clear_command: Option<Vec<String>>,
}

impl ClipboardConfig {
    pub fn clear_after(&self) -> Option<Duration> {
        self.clear_after_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Auto-type settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Pause before typing so the launcher can hand focus back
    #[serde(default = "default_focus_delay")]
    pub focus_delay_ms: u64,

    /// Pause between keystrokes
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,

    /// Upper bound on one typing run
    #[serde(default = "default_typing_timeout")]
    pub timeout_secs: u64,
}

fn default_focus_delay() -> u64 {
    100
}

fn default_keystroke_delay() -> u64 {
    50
}

fn default_typing_timeout() -> u64 {
    10
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            focus_delay_ms: default_focus_delay(),
            keystroke_delay_ms: default_keystroke_delay(),
            timeout_secs: default_typing_timeout(),
        }
    }
}

impl TypingConfig {
    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Desktop notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_notify_title")]
    pub title: String,

    /// Give up on a notification after this long; the Run result stands
    #[serde(default = "default_notify_timeout")]
    pub timeout_ms: u64,
}

fn default_notify_title() -> String {
    "Pass Runner".to_string()
}

fn default_notify_timeout() -> u64 {
    5000
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_notify_title(),
            timeout_ms: default_notify_timeout(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Launcher-facing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Queries must start with this word; empty matches every query
    #[serde(default = "default_keyword")]
    pub keyword: String,
}

fn default_keyword() -> String {
    "pass".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the standard location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))
    }

    /// Parse configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.store_dir = paths::expand_home(&config.store_dir);
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Paths::new().config_file()
    }
}
