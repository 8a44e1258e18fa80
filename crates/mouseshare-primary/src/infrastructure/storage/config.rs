//! TOML configuration for the primary application.
//!
//! Loaded from `mouseshare.toml` in the platform config directory:
//! - Windows: `%APPDATA%\MouseShare\mouseshare.toml`
//! - Linux:   `$XDG_CONFIG_HOME/mouseshare/mouseshare.toml` (or `~/.config/...`)
//! - macOS:   `~/Library/Application Support/MouseShare/mouseshare.toml`
//!
//! Every field carries a serde default, so a missing file and a partial
//! file both work; the CLI overrides whatever the file says.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mouseshare_core::domain::keys;
use mouseshare_core::domain::topology::DEFAULT_PEER_EXPIRY_MS;
use mouseshare_core::protocol::discovery::{DEFAULT_DISCOVERY_PORT, DEFAULT_SESSION_PORT};
use mouseshare_core::protocol::event::Edge;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration for the primary host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub switching: SwitchingConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Identity and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Name announced on the LAN; peers are identified by it. Defaults to
    /// the machine's host name.
    #[serde(default = "default_host_name")]
    pub name: String,
    /// `tracing` level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP port the session listener accepts on.
    #[serde(default = "default_session_port")]
    pub port: u16,
    /// UDP port used for presence broadcasts.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
}

/// Edge-switching behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchingConfig {
    /// Exit edge used by the manual toggle when no edge was crossed.
    #[serde(default = "default_switch_edge")]
    pub switch_edge: Edge,
    /// Panic release key (virtual-key code). Default Scroll Lock.
    #[serde(default = "default_toggle_key")]
    pub toggle_key: u32,
    /// Manual flip key (virtual-key code). Default F8.
    #[serde(default = "default_user_toggle_key")]
    pub user_toggle_key: u32,
}

/// Intervals and timeouts, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_safety_release")]
    pub safety_release_ms: u64,
    #[serde(default = "default_peer_expiry")]
    pub peer_expiry_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host_name() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "mouseshare-primary".to_string())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_session_port() -> u16 {
    DEFAULT_SESSION_PORT
}
fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}
fn default_switch_edge() -> Edge {
    Edge::Right
}
fn default_toggle_key() -> u32 {
    keys::VK_SCROLL
}
fn default_user_toggle_key() -> u32 {
    keys::VK_F8
}
fn default_reconnect_interval() -> u64 {
    3_000
}
fn default_keepalive_interval() -> u64 {
    5_000
}
fn default_idle_timeout() -> u64 {
    30_000
}
fn default_safety_release() -> u64 {
    30_000
}
fn default_peer_expiry() -> u64 {
    DEFAULT_PEER_EXPIRY_MS
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: default_host_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_session_port(),
            discovery_port: default_discovery_port(),
        }
    }
}

impl Default for SwitchingConfig {
    fn default() -> Self {
        Self {
            switch_edge: default_switch_edge(),
            toggle_key: default_toggle_key(),
            user_toggle_key: default_user_toggle_key(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval(),
            keepalive_interval_ms: default_keepalive_interval(),
            idle_timeout_ms: default_idle_timeout(),
            safety_release_ms: default_safety_release(),
            peer_expiry_ms: default_peer_expiry(),
        }
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Resolves the full path of the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform base
/// directory cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("mouseshare.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads configuration from `path`, or defaults when the file is absent.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than
/// "not found" and [`ConfigError::Parse`] for malformed TOML.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io { path: path.to_path_buf(), source }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Serialize`] on failure.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("MouseShare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("MouseShare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .map(|base| base.join("mouseshare"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_surface() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.network.port, 24800);
        assert_eq!(cfg.network.discovery_port, 24801);
        assert_eq!(cfg.switching.switch_edge, Edge::Right);
        assert_eq!(cfg.switching.toggle_key, keys::VK_SCROLL);
        assert_eq!(cfg.switching.user_toggle_key, keys::VK_F8);
        assert_eq!(cfg.timing.reconnect_interval_ms, 3_000);
        assert_eq!(cfg.timing.keepalive_interval_ms, 5_000);
        assert_eq!(cfg.timing.idle_timeout_ms, 30_000);
        assert_eq!(cfg.timing.safety_release_ms, 30_000);
        assert_eq!(cfg.timing.peer_expiry_ms, 10_000);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = AppConfig::default();
        cfg.network.port = 9000;
        cfg.switching.switch_edge = Edge::Left;
        cfg.host.name = "desk-main".to_string();

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
[network]
port = 9999

[switching]
switch_edge = "left"
"#,
        )
        .expect("deserialize partial");

        assert_eq!(cfg.network.port, 9999);
        assert_eq!(cfg.network.discovery_port, 24801);
        assert_eq!(cfg.switching.switch_edge, Edge::Left);
        assert_eq!(cfg.timing.keepalive_interval_ms, 5_000);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[[[ not toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_returns_defaults_for_missing_file() {
        let path = std::env::temp_dir().join("mouseshare-test-does-not-exist.toml");
        let cfg = load_config(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("mouseshare-cfg-{}", std::process::id()));
        let path = dir.join("mouseshare.toml");

        let mut cfg = AppConfig::default();
        cfg.network.port = 12345;
        cfg.host.log_level = "debug".to_string();

        save_config(&cfg, &path).expect("save");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);

        std::fs::remove_dir_all(&dir).ok();
    }
}
