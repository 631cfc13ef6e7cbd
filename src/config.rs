use crate::error::{DinoError, Result};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Dotted quad of this node. Detected from the primary interface when absent.
    pub ip: Option<String>,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db")]
    pub db: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_db() -> PathBuf {
    PathBuf::from("dino.db")
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_concurrency() -> usize {
    32
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { db: default_db() }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// The `ip:port` this node serves on and sweeps around.
    pub fn base_address(&self) -> Result<SocketAddrV4> {
        let ip = match &self.server.ip {
            Some(ip) => ip
                .parse::<Ipv4Addr>()
                .map_err(|_| DinoError::InvalidAddress(ip.clone()))?,
            None => detect_local_ipv4(),
        };
        Ok(SocketAddrV4::new(ip, self.server.port))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.timeout_ms)
    }

    pub fn concurrency(&self) -> usize {
        self.discovery.concurrency.max(1)
    }
}

fn detect_local_ipv4() -> Ipv4Addr {
    match local_ip_address::local_ip() {
        Ok(std::net::IpAddr::V4(ip)) => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// Publish the process-wide configuration. The first call wins; returns
/// whether this call did.
pub fn install(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

pub fn current() -> Option<&'static Config> {
    CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [server]
            ip = "10.0.0.5"
            port = 5000

            [database]
            db = "/var/lib/dino/users.db"

            [discovery]
            timeout_ms = 1500
            concurrency = 16
            "#,
        )
        .unwrap();

        assert_eq!(
            config.base_address().unwrap(),
            "10.0.0.5:5000".parse::<SocketAddrV4>().unwrap()
        );
        assert_eq!(config.database.db, PathBuf::from("/var/lib/dino/users.db"));
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.concurrency(), 16);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("[server]\nip = \"192.168.1.20\"\nport = 7000\n").unwrap();

        assert_eq!(config.database.db, PathBuf::from("dino.db"));
        assert_eq!(config.discovery.timeout_ms, 2000);
        assert_eq!(config.concurrency(), 32);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = Config::from_toml(
            "[server]\nip = \"192.168.1.20\"\nport = 7000\n[discovery]\nconcurrency = 0\n",
        )
        .unwrap();

        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_rejects_non_ipv4() {
        let config = Config::from_toml("[server]\nip = \"::1\"\nport = 7000\n").unwrap();

        assert!(matches!(
            config.base_address(),
            Err(DinoError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_detects_ip_when_missing() {
        let config = Config::from_toml("[server]\nport = 7000\n").unwrap();

        assert_eq!(config.base_address().unwrap().port(), 7000);
    }

    #[test]
    fn test_missing_port_is_an_error() {
        assert!(matches!(
            Config::from_toml("[server]\nip = \"10.0.0.5\"\n"),
            Err(DinoError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nip = \"172.16.4.9\"\nport = 5000").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.ip.as_deref(), Some("172.16.4.9"));
    }

    #[test]
    fn test_install_is_first_wins() {
        let first = Config::from_toml("[server]\nip = \"10.1.1.1\"\nport = 1\n").unwrap();
        let second = Config::from_toml("[server]\nip = \"10.2.2.2\"\nport = 2\n").unwrap();

        assert!(install(first.clone()));
        assert!(!install(second));
        assert_eq!(current(), Some(&first));
    }
}
