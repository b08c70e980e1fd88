//! extip.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtipConfig {
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub quota: QuotaSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Base address used when building resource hyperlinks.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaSettings {
    /// External IPs per tenant when no override exists. `None` means unlimited.
    pub default_external_ips: Option<u32>,
    #[serde(default)]
    pub tenants: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Port used when a tenant's agent binding does not carry one.
    #[serde(default = "default_agent_port")]
    pub port: u16,
    #[serde(default = "default_agent_timeout")]
    pub timeout: String,
}

fn default_api_url() -> String {
    "https://localhost:8889".to_string()
}

fn default_port() -> u16 {
    8889
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/extip")
}

fn default_agent_port() -> u16 {
    9999
}

fn default_agent_timeout() -> String {
    "5s".to_string()
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            port: default_agent_port(),
            timeout: default_agent_timeout(),
        }
    }
}

impl AgentSettings {
    /// Per-call timeout for agent requests, falling back to 5s on a bad value.
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(5))
    }
}

impl ExtipConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExtipConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse a duration like "500ms", "5s", "2m", or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
