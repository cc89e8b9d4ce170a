use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// Access team domain that issues tokens. Unset together with
    /// `audience` means the gate runs in dev mode.
    #[serde(default = "default_team_domain")]
    pub team_domain: Option<String>,

    #[serde(default = "default_audience")]
    pub audience: Option<String>,

    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_secs: u64,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dockyard")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_bind_addr() -> String {
    std::env::var("DOCKYARD_BIND").unwrap_or_else(|_| "0.0.0.0:8787".to_string())
}

fn default_db_path() -> PathBuf {
    non_empty_env("DOCKYARD_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("dockyard.db"))
}

fn default_blob_dir() -> PathBuf {
    non_empty_env("DOCKYARD_BLOB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("blobs"))
}

fn default_team_domain() -> Option<String> {
    non_empty_env("CF_ACCESS_TEAM_DOMAIN")
}

fn default_audience() -> Option<String> {
    non_empty_env("CF_ACCESS_AUD")
}

fn default_key_cache_ttl() -> u64 {
    std::env::var("DOCKYARD_KEY_CACHE_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(300) // 5 minutes
}

fn default_scan_interval() -> u64 {
    std::env::var("DOCKYARD_SCAN_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            blob_dir: default_blob_dir(),
            team_domain: default_team_domain(),
            audience: default_audience(),
            key_cache_ttl_secs: default_key_cache_ttl(),
            scan_interval_secs: default_scan_interval(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Both trust settings are required for token validation.
    pub fn access_enabled(&self) -> bool {
        self.team_domain.is_some() && self.audience.is_some()
    }
}
