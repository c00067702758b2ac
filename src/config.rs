use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::device::parse_mac;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    NoConfigDir,
    #[error("config file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub kodi: KodiConfig,
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub trakt: TraktConfig,
    #[serde(default)]
    pub players: PlayersConfig,
    #[serde(default)]
    pub patcher: PatcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Network identity of the Android TV box.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub ip: String,
    /// Hardware address for wake-on-LAN, e.g. "AA:BB:CC:DD:EE:FF".
    pub mac: String,
    #[serde(default = "default_adb_port")]
    pub adb_port: u16,
}

fn default_adb_port() -> u16 {
    5555
}

impl DeviceConfig {
    /// adb serial of the device ("ip:port").
    pub fn adb_host(&self) -> String {
        format!("{}:{}", self.ip, self.adb_port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KodiConfig {
    #[serde(default = "default_kodi_port")]
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self {
            port: default_kodi_port(),
            user: None,
            pass: None,
        }
    }
}

fn default_kodi_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbConfig {
    pub apikey: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktConfig {
    #[serde(default)]
    pub enabled: bool,
    pub client_id: Option<String>,
    pub access_token: Option<String>,
}

/// Player profile names passed to the Kodi helper addon.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayersConfig {
    #[serde(default = "default_player_auto")]
    pub auto: String,
    #[serde(default = "default_player_select")]
    pub select: String,
}

impl Default for PlayersConfig {
    fn default() -> Self {
        Self {
            auto: default_player_auto(),
            select: default_player_select(),
        }
    }
}

fn default_player_auto() -> String {
    "fenlight_auto.json".to_string()
}

fn default_player_select() -> String {
    "fenlight_select.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_patch_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_patch_path")]
    pub remote_path: String,
    /// Line content that identifies the blocking behavior to neutralize.
    #[serde(default = "default_patch_marker")]
    pub marker: String,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_patch_interval(),
            remote_path: default_patch_path(),
            marker: default_patch_marker(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_patch_interval() -> u64 {
    3600
}

fn default_patch_path() -> String {
    "/sdcard/Android/data/org.xbmc.kodi/files/.kodi/addons/plugin.video.fenlight/resources/lib/modules/sources.py".to_string()
}

fn default_patch_marker() -> String {
    "return kodi_utils.notification('WARNING: External Playback Detected!')".to_string()
}

#[derive(Default, Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub temp_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kodilink"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub verbose: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.clone()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "kodilink")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Kodi JSON-RPC endpoint on the device.
    pub fn kodi_base_url(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.device.ip, self.kodi.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.ip.is_empty() {
            return Err(ConfigError::ValidationError(
                "device.ip cannot be empty".to_string(),
            ));
        }

        if parse_mac(&self.device.mac).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "device.mac \"{}\" is not a valid hardware address",
                self.device.mac
            )));
        }

        if self.tmdb.apikey.is_empty() {
            return Err(ConfigError::ValidationError(
                "tmdb.apikey cannot be empty".to_string(),
            ));
        }

        if self.trakt.enabled
            && (self.trakt.client_id.is_none() || self.trakt.access_token.is_none())
        {
            return Err(ConfigError::ValidationError(
                "trakt.enabled requires trakt.client_id and trakt.access_token".to_string(),
            ));
        }

        if self.patcher.enabled && self.patcher.interval_secs < 60 {
            return Err(ConfigError::ValidationError(
                "patcher.interval_secs must be at least 60".to_string(),
            ));
        }

        if self.patcher.enabled && self.patcher.marker.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "patcher.marker cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[device]
ip = "192.168.1.40"
mac = "AA:BB:CC:DD:EE:FF"

[tmdb]
apikey = "secret"
"#
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.device.adb_host(), "192.168.1.40:5555");
        assert_eq!(config.kodi.port, 8080);
        assert_eq!(config.players.auto, "fenlight_auto.json");
        assert_eq!(config.patcher.interval_secs, 3600);
        assert!(config.patcher.enabled);
        assert_eq!(config.kodi_base_url(), "http://192.168.1.40:8080/jsonrpc");
    }

    #[test]
    fn test_bad_mac_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.device.mac = "not-a-mac".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_trakt_enabled_requires_credentials() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.trakt.enabled = true;
        assert!(config.validate().is_err());

        config.trakt.client_id = Some("id".to_string());
        config.trakt.access_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_patch_interval_floor() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.patcher.interval_secs = 5;
        assert!(config.validate().is_err());
    }
}
