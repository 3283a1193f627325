use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest MTU the engine accepts (IPv4 minimum reassembly size)
pub const MIN_MTU: i32 = 576;
pub const MAX_MTU: i32 = 65535;

/// Parameters handed over by the host for one session.
///
/// Consumed by `SessionController::init` to configure crypto, DNS and the
/// tunnel engine; nothing of it is retained afterwards except the
/// global-proxy flag.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tunnel file descriptor opened by the host's VpnService
    pub tun_fd: i32,
    pub mtu: i32,
    pub global_proxy: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Upstream server endpoint, `host:port`
    pub server: String,
    pub passphrase: String,
    /// DNS endpoint used by the engine for resolution
    pub dns: String,
    /// Domain routing table loaded by the DNS subsystem (unused in global-proxy mode)
    #[serde(default)]
    pub domain_table: String,
}

impl SessionConfig {
    /// Check the host-supplied parameters before any subsystem is touched
    pub fn validate(&self) -> Result<()> {
        if self.tun_fd < 0 {
            return Err(Error::config(format!(
                "Invalid tunnel descriptor: {}",
                self.tun_fd
            )));
        }

        if !(MIN_MTU..=MAX_MTU).contains(&self.mtu) {
            return Err(Error::config(format!(
                "MTU {} out of range {}..={}",
                self.mtu, MIN_MTU, MAX_MTU
            )));
        }

        if self.server.trim().is_empty() {
            return Err(Error::config("Server endpoint is empty"));
        }

        if server_host(&self.server).is_empty() {
            return Err(Error::config(format!(
                "Server endpoint has no host: {}",
                self.server
            )));
        }

        if self.dns.trim().is_empty() {
            return Err(Error::config("DNS endpoint is empty"));
        }

        if !self.global_proxy && self.domain_table.trim().is_empty() {
            return Err(Error::config(
                "Domain table path is required when global proxy is disabled",
            ));
        }

        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Host part of a `host:port` endpoint, brackets stripped
fn server_host(server: &str) -> &str {
    let server = server.trim();
    let host = server.rsplit_once(':').map_or(server, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']').trim()
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("tun_fd", &self.tun_fd)
            .field("mtu", &self.mtu)
            .field("global_proxy", &self.global_proxy)
            .field("verbose", &self.verbose)
            .field("server", &self.server)
            .field("passphrase", &"<redacted>")
            .field("dns", &self.dns)
            .field("domain_table", &self.domain_table)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

/// Server profile as persisted by the Android app.
///
/// Field names follow the app's JSON so stored profiles deserialize as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    pub host: String,
    #[serde(rename = "remotePort")]
    pub remote_port: u16,
    pub mtu: i32,
    pub password: String,
    pub route: String,
    pub global: bool,
    #[serde(rename = "route_bypass")]
    pub bypass: bool,
    pub individual: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Untitled".to_string(),
            local_ip: "10.0.0.3".to_string(),
            host: String::new(),
            remote_port: 1082,
            mtu: 1440,
            password: String::new(),
            route: "all".to_string(),
            global: true,
            bypass: false,
            individual: String::new(),
        }
    }
}

impl Profile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::config_with_source("Invalid profile JSON", e))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::config_with_source("Failed to serialize profile", e))
    }

    /// `host:port`, with IPv6 literals bracketed. A profile without a host
    /// yields `:port`, which `SessionConfig::validate` rejects.
    pub fn server_endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.remote_port)
        } else {
            format!("{}:{}", self.host, self.remote_port)
        }
    }

    /// Build the session parameters for this profile once the host has
    /// established the tunnel descriptor.
    pub fn session_config(
        &self,
        tun_fd: i32,
        verbose: bool,
        dns: impl Into<String>,
        domain_table: impl Into<String>,
    ) -> SessionConfig {
        SessionConfig {
            tun_fd,
            mtu: self.mtu,
            global_proxy: self.global,
            verbose,
            server: self.server_endpoint(),
            passphrase: self.password.clone(),
            dns: dns.into(),
            domain_table: domain_table.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SessionConfig {
        SessionConfig {
            tun_fd: 5,
            mtu: 1500,
            global_proxy: false,
            verbose: false,
            server: "1.2.3.4:443".to_string(),
            passphrase: "secret".to_string(),
            dns: "8.8.8.8".to_string(),
            domain_table: "/data/domains.txt".to_string(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_negative_fd_rejected() {
        let config = SessionConfig {
            tun_fd: -1,
            ..sample_config()
        };
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG");
    }

    #[test]
    fn test_mtu_bounds() {
        for mtu in [0, 575, 65536] {
            let config = SessionConfig {
                mtu,
                ..sample_config()
            };
            assert!(config.validate().is_err(), "mtu {} accepted", mtu);
        }
        for mtu in [MIN_MTU, 1440, MAX_MTU] {
            let config = SessionConfig {
                mtu,
                ..sample_config()
            };
            assert!(config.validate().is_ok(), "mtu {} rejected", mtu);
        }
    }

    #[test]
    fn test_domain_table_only_required_without_global_proxy() {
        let config = SessionConfig {
            domain_table: String::new(),
            ..sample_config()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            global_proxy: true,
            domain_table: String::new(),
            ..sample_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let output = format!("{:?}", sample_config());
        assert!(!output.contains("secret"));
        assert!(output.contains("<redacted>"));
    }

    #[test]
    fn test_log_level_follows_verbose() {
        assert_eq!(sample_config().log_level(), LogLevel::Info);
        let config = SessionConfig {
            verbose: true,
            ..sample_config()
        };
        assert_eq!(config.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_profile_defaults_from_partial_json() {
        let profile = Profile::from_json(r#"{"host":"example.com","password":"pw"}"#).unwrap();
        assert_eq!(profile.name, "Untitled");
        assert_eq!(profile.local_ip, "10.0.0.3");
        assert_eq!(profile.remote_port, 1082);
        assert_eq!(profile.mtu, 1440);
        assert_eq!(profile.route, "all");
        assert!(profile.global);
        assert!(!profile.bypass);
    }

    #[test]
    fn test_profile_app_field_names() {
        let json = r#"{
            "id": 3,
            "name": "home",
            "localIP": "10.0.0.9",
            "host": "vpn.example.com",
            "remotePort": 8443,
            "mtu": 1400,
            "password": "pw",
            "route": "bypass-lan",
            "global": false,
            "route_bypass": true
        }"#;
        let profile = Profile::from_json(json).unwrap();
        assert_eq!(profile.id, 3);
        assert_eq!(profile.local_ip, "10.0.0.9");
        assert_eq!(profile.remote_port, 8443);
        assert!(!profile.global);
        assert!(profile.bypass);

        let reparsed = Profile::from_json(&profile.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, profile);
    }

    #[test]
    fn test_profile_invalid_json() {
        let err = Profile::from_json("{").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_server_endpoint() {
        let mut profile = Profile {
            host: "1.2.3.4".to_string(),
            remote_port: 443,
            ..Profile::default()
        };
        assert_eq!(profile.server_endpoint(), "1.2.3.4:443");

        profile.host = "2001:db8::1".to_string();
        assert_eq!(profile.server_endpoint(), "[2001:db8::1]:443");
    }

    #[test]
    fn test_server_without_host_rejected() {
        for server in [":1082", "  :443", "[]:443"] {
            let config = SessionConfig {
                server: server.to_string(),
                ..sample_config()
            };
            assert_eq!(config.validate().unwrap_err().code(), "CONFIG", "{}", server);
        }

        let config = SessionConfig {
            server: "[2001:db8::1]:443".to_string(),
            ..sample_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_without_host_fails_validation() {
        let config = Profile::default().session_config(5, false, "8.8.8.8", "/data/domains.txt");
        assert_eq!(config.server, ":1082");
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG");
    }

    #[test]
    fn test_profile_session_config() {
        let profile = Profile {
            host: "1.2.3.4".to_string(),
            remote_port: 443,
            password: "secret".to_string(),
            global: false,
            ..Profile::default()
        };
        let config = profile.session_config(5, true, "8.8.8.8", "/data/domains.txt");
        assert_eq!(config.tun_fd, 5);
        assert_eq!(config.mtu, 1440);
        assert!(!config.global_proxy);
        assert!(config.verbose);
        assert_eq!(config.server, "1.2.3.4:443");
        assert_eq!(config.passphrase, "secret");
        assert!(config.validate().is_ok());
    }
}
