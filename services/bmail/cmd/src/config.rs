//! Configuration handling for the bmail node.
//!
//! Settings come from a YAML file, then environment variables, then the
//! command line, each layer overriding the previous one.

use anyhow::{Context, Result};
use bmail_crypto::Identity;
use bmail_session::{MailServerConfig, ACK_OVERHEAD};
use bmail_wire::{BMTP_PORT, BPOP_PORT, DEFAULT_MAX_PAYLOAD_SIZE, HARD_MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP both listeners bind to
    pub bind_ip: IpAddr,
    /// Transfer (BMTP) port
    pub bmtp_port: u16,
    /// Retrieval (BPOP) port
    pub bpop_port: u16,
    /// Idle timeout per connection (seconds)
    pub timeout_secs: u64,
    /// Largest frame payload accepted
    pub max_payload_bytes: usize,
    /// Largest encrypted content accepted per envelope; must leave
    /// `ACK_OVERHEAD` bytes below `max_payload_bytes`
    pub max_content_bytes: usize,
    /// Mail domain this node serves
    pub local_domain: String,
    /// Hex-encoded Ed25519 secret; empty means a fresh key on every start
    pub server_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bmtp_port: BMTP_PORT,
            bpop_port: BPOP_PORT,
            timeout_secs: 30,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_SIZE,
            max_content_bytes: 8 * 1024 * 1024,
            local_domain: "localhost".to_string(),
            server_key: String::new(),
        }
    }
}

/// Root of the YAML file
#[derive(Debug, Deserialize)]
struct RootConfig {
    bmail: Option<ServerConfig>,
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let root: RootConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {path:?}"))?;
                info!("Loaded configuration from {:?}", path);
                root.bmail.unwrap_or_default()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config file {path:?}"));
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        info!(
            "Final configuration: bind={} bmtp={} bpop={} timeout={}s domain={}",
            config.bind_ip, config.bmtp_port, config.bpop_port, config.timeout_secs, config.local_domain
        );
        Ok(config)
    }

    /// Apply `BMAIL_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ip) = lookup("BMAIL_BIND_IP").and_then(|v| v.parse().ok()) {
            self.bind_ip = ip;
            info!("Bind IP overridden by environment: {}", ip);
        }
        if let Some(port) = lookup("BMAIL_BMTP_PORT").and_then(|v| v.parse().ok()) {
            self.bmtp_port = port;
            info!("BMTP port overridden by environment: {}", port);
        }
        if let Some(port) = lookup("BMAIL_BPOP_PORT").and_then(|v| v.parse().ok()) {
            self.bpop_port = port;
            info!("BPOP port overridden by environment: {}", port);
        }
        if let Some(secs) = lookup("BMAIL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = secs;
            info!("Timeout overridden by environment: {}s", secs);
        }
        if let Some(key) = lookup("BMAIL_SERVER_KEY") {
            self.server_key = key;
            info!("Server key taken from environment");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bmtp_port == self.bpop_port && self.bmtp_port != 0 {
            anyhow::bail!("bmtp_port and bpop_port must differ (both {})", self.bmtp_port);
        }
        if self.max_payload_bytes == 0 || self.max_payload_bytes > HARD_MAX_PAYLOAD_SIZE {
            anyhow::bail!(
                "max_payload_bytes must be between 1 and {}",
                HARD_MAX_PAYLOAD_SIZE
            );
        }
        if self.max_content_bytes.saturating_add(ACK_OVERHEAD) > self.max_payload_bytes {
            anyhow::bail!(
                "max_content_bytes must leave {} bytes of reply overhead below max_payload_bytes",
                ACK_OVERHEAD
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn bmtp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.bmtp_port)
    }

    pub fn bpop_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.bpop_port)
    }

    /// Identity from `server_key`, or a throwaway one when none is set
    pub fn identity(&self) -> Result<Identity> {
        if self.server_key.trim().is_empty() {
            warn!("No server key configured, using an ephemeral identity");
            return Ok(Identity::generate());
        }
        Identity::from_hex(self.server_key.trim()).context("invalid server key")
    }

    pub fn mail_server_config(&self) -> MailServerConfig {
        MailServerConfig {
            idle_timeout: self.timeout(),
            max_payload_size: self.max_payload_bytes,
            max_content_bytes: self.max_content_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bmtp_port, 1025);
        assert_eq!(config.bpop_port, 1110);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_payload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.max_content_bytes, 8 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
bmail:
  bind_ip: 127.0.0.1
  bmtp_port: 2025
  local_domain: example.bm
  max_content_bytes: 1024
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ServerConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.bmtp_addr(), "127.0.0.1:2025".parse().unwrap());
        assert_eq!(config.bpop_port, 1110);
        assert_eq!(config.local_domain, "example.bm");
        assert_eq!(config.max_content_bytes, 1024);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.bmtp_port, ServerConfig::default().bmtp_port);
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load_from_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"bmail: [not, a, map").unwrap();
        assert!(ServerConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("BMAIL_BIND_IP", "10.0.0.1"),
            ("BMAIL_BPOP_PORT", "2110"),
            ("BMAIL_TIMEOUT_SECS", "5"),
            ("BMAIL_BMTP_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.bpop_port, 2110);
        assert_eq!(config.bmtp_port, 1025);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_identity_from_key() {
        let original = Identity::generate();
        let config = ServerConfig {
            server_key: hex::encode(*original.secret_bytes()),
            ..ServerConfig::default()
        };
        assert_eq!(config.identity().unwrap().address(), original.address());

        let bad = ServerConfig {
            server_key: "zz".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad.identity().is_err());
        assert!(ServerConfig::default().identity().is_ok());
    }

    #[test]
    fn test_validate() {
        let same_ports = ServerConfig {
            bpop_port: 1025,
            ..ServerConfig::default()
        };
        assert!(same_ports.validate().is_err());

        let content_too_big = ServerConfig {
            max_content_bytes: DEFAULT_MAX_PAYLOAD_SIZE + 1,
            ..ServerConfig::default()
        };
        assert!(content_too_big.validate().is_err());

        let no_reply_room = ServerConfig {
            max_payload_bytes: 8192,
            max_content_bytes: 8192,
            ..ServerConfig::default()
        };
        assert!(no_reply_room.validate().is_err());

        let with_reply_room = ServerConfig {
            max_payload_bytes: 8192,
            max_content_bytes: 8192 - ACK_OVERHEAD,
            ..ServerConfig::default()
        };
        assert!(with_reply_room.validate().is_ok());

        let no_timeout = ServerConfig {
            timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }
}
