//! Server configuration types
//!
//! Defines the main configuration structures for the Socksd server.

use super::TcpConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:1080")
    pub listen_addr: String,

    /// SOCKS protocol configuration
    #[serde(default)]
    pub socks: SocksConfig,

    /// TCP socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

fn default_true() -> bool {
    true
}

/// Default request timeout in seconds
fn default_request_timeout() -> u64 {
    10
}

/// Default BIND accept timeout in seconds
fn default_bind_timeout() -> u64 {
    60
}

/// SOCKS server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// Reject clients that do not authenticate with username/password
    #[serde(default)]
    pub auth_required: bool,

    /// Username for SOCKS5 auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for SOCKS5 auth
    #[serde(default)]
    pub password: Option<String>,

    /// Allow CONNECT command
    #[serde(default = "default_true")]
    pub allow_connect: bool,

    /// Allow BIND command
    #[serde(default)]
    pub allow_bind: bool,

    /// Allow UDP ASSOCIATE command
    #[serde(default = "default_true")]
    pub allow_udp: bool,

    /// Handshake and dial timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// How long BIND waits for the inbound connection, in seconds
    #[serde(default = "default_bind_timeout")]
    pub bind_timeout: u64,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            auth_required: false,
            username: None,
            password: None,
            allow_connect: true,
            allow_bind: false,
            allow_udp: true,
            request_timeout: default_request_timeout(),
            bind_timeout: default_bind_timeout(),
        }
    }
}

impl SocksConfig {
    /// Check if authentication credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_required && !self.has_credentials() {
            return Err("Authentication required but no credentials configured".to_string());
        }
        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than zero".to_string());
        }
        if self.bind_timeout == 0 {
            return Err("bind_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
