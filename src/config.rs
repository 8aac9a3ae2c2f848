use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

const REQUIRED_VARS: [&str; 4] = [
    "ACCESS_TOKEN",
    "CHANNEL_SECRET",
    "SOURCE_GROUP_ID",
    "TARGET_GROUP_ID",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub line: LineConfig,
    pub relay: RelayConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct LineConfig {
    pub access_token: String,
    pub channel_secret: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub source_group_id: String,
    pub target_group_id: String,
    pub filter: FilterConfig,
}

/// Keyword rules deciding which source-group messages get forwarded.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_start_keyword")]
    pub start_keyword: String,
    #[serde(default = "default_required_substrings")]
    pub required_substrings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
}

/// Layout of the optional TOML file; only the `[filter]` table is read.
#[derive(Debug, Deserialize, Default)]
struct RelayFile {
    #[serde(default)]
    filter: Option<FilterConfig>,
}

fn default_start_keyword() -> String {
    "【Cashier Notifier】".to_string()
}

fn default_required_substrings() -> Vec<String> {
    vec!["錯誤碼：".to_string(), "video:".to_string()]
}

fn default_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            start_keyword: default_start_keyword(),
            required_substrings: default_required_substrings(),
        }
    }
}

impl FilterConfig {
    /// Read the `[filter]` table from a TOML file. A missing file yields the
    /// built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read relay config: {}", path.display()))?;
        let file: RelayFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse relay config: {}", path.display()))?;

        Ok(file.filter.unwrap_or_default())
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

impl Config {
    /// Load configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Every required variable that is unset or blank is reported in a single
    /// error so a misconfigured deployment fails on the first start.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| lookup(*key).map_or(true, |v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let required = |key: &str| lookup(key).unwrap_or_default();

        let port = match lookup("PORT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {raw}"))?,
            None => default_port(),
        };

        let api_base_url = lookup("LINE_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(default_api_base_url);

        let filter_path = lookup("RELAY_CONFIG").unwrap_or_else(|| "relay.toml".to_string());
        let filter = FilterConfig::load(Path::new(&filter_path))?;

        Ok(Config {
            line: LineConfig {
                access_token: required("ACCESS_TOKEN"),
                channel_secret: required("CHANNEL_SECRET"),
                api_base_url,
            },
            relay: RelayConfig {
                source_group_id: required("SOURCE_GROUP_ID"),
                target_group_id: required("TARGET_GROUP_ID"),
                filter,
            },
            server: ServerConfig { port },
        })
    }
}
