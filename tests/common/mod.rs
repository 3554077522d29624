//! Test utilities and mocks for Socksd
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use socksd::config::{ServerConfig, SocksConfig, TcpConfig};
use socksd::Server;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Spawn a TCP server that echoes everything back on every connection
pub async fn spawn_tcp_echo() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut conn, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match conn.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if conn.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Spawn a UDP server that echoes every datagram back to its sender
pub async fn spawn_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });
    addr
}

/// Start a server on an ephemeral port
///
/// Keep the returned sender alive for as long as the server should run.
pub async fn start_server(config: ServerConfig) -> (SocketAddr, broadcast::Sender<bool>) {
    let server = Server::builder(config).build().unwrap();
    let (listener, addr) = create_test_listener().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move { server.serve(listener, shutdown_rx).await });
    (addr, shutdown_tx)
}

/// Test configuration builder
pub struct TestConfigBuilder {
    credentials: Option<(String, String)>,
    auth_required: bool,
    allow_bind: bool,
    allow_udp: bool,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            credentials: None,
            auth_required: false,
            allow_bind: false,
            allow_udp: true,
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure credentials
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Set authentication required
    pub fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    /// Allow BIND
    pub fn allow_bind(mut self, allow: bool) -> Self {
        self.allow_bind = allow;
        self
    }

    /// Allow UDP
    pub fn allow_udp(mut self, allow: bool) -> Self {
        self.allow_udp = allow;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServerConfig {
        let (username, password) = match self.credentials {
            Some((username, password)) => (Some(username), Some(password)),
            None => (None, None),
        };
        ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            socks: SocksConfig {
                auth_required: self.auth_required,
                username,
                password,
                allow_connect: true,
                allow_bind: self.allow_bind,
                allow_udp: self.allow_udp,
                request_timeout: 5,
                bind_timeout: 5,
            },
            tcp: TcpConfig::default(),
        }
    }
}

/// Raw SOCKS handshake bytes
pub mod socks_mock {
    use socksd::socks::consts::*;
    use std::net::SocketAddr;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a SOCKS5 request to an IPv4 address
    pub fn create_socks5_request(command: u8, addr: SocketAddr) -> Vec<u8> {
        let mut cmd = vec![SOCKS5_VERSION, command, SOCKS5_RESERVED];
        match addr {
            SocketAddr::V4(v4) => {
                cmd.push(SOCKS5_ADDR_TYPE_IPV4);
                cmd.extend_from_slice(&v4.ip().octets());
            }
            SocketAddr::V6(v6) => {
                cmd.push(SOCKS5_ADDR_TYPE_IPV6);
                cmd.extend_from_slice(&v6.ip().octets());
            }
        }
        cmd.extend_from_slice(&addr.port().to_be_bytes());
        cmd
    }

    /// Create a SOCKS4 CONNECT request
    pub fn create_socks4_connect(ip: [u8; 4], port: u16, user: &str) -> Vec<u8> {
        let mut cmd = vec![SOCKS4_VERSION, SOCKS_CMD_CONNECT];
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(user.as_bytes());
        cmd.push(0);
        cmd
    }

    /// Create a SOCKS4a CONNECT request carrying a hostname
    pub fn create_socks4a_connect(host: &str, port: u16, user: &str) -> Vec<u8> {
        let mut cmd = create_socks4_connect([0, 0, 0, 1], port, user);
        cmd.extend_from_slice(host.as_bytes());
        cmd.push(0);
        cmd
    }

    /// Port carried in a 10-byte IPv4 SOCKS5 reply
    pub fn reply_port(reply: &[u8]) -> u16 {
        u16::from_be_bytes([reply[8], reply[9]])
    }
}
