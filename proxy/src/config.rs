use common::Bitrate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address the forwarding proxy accepts client connections on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Address of the HTTP control endpoint
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Initial max bitrate in bits per second, 0 = unlimited
    #[serde(default)]
    pub max_bitrate: Bitrate,

    /// Base URI (scheme and authority) used for origin-form requests.
    /// Without it the Host header picks the target.
    #[serde(default)]
    pub upstream: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log to daily rolling files in this directory instead of stdout
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub console_port: Option<u16>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_control_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "proxy.log".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            control_addr: default_control_addr(),
            max_bitrate: Bitrate::ZERO,
            upstream: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            log_level: default_log_level(),
            log_dir: None,
            log_file: default_log_file(),
            console_port: None,
        }
    }
}

impl ProxyConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ProxyConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
