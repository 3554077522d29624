//! Transport module for Socksd
//!
//! This module provides the outbound transport abstraction used by command
//! handlers: dialing destinations and allocating listeners and UDP sockets.

mod tcp;

pub use tcp::DirectDialer;

use crate::config::TcpConfig;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs).filter(|secs| *secs > 0),
            keepalive_interval: Some(config.keepalive_interval).filter(|secs| *secs > 0),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Outbound transport used by command handlers
///
/// Implementations decide how destinations are reached; the SOCKS engine only
/// sees the resulting sockets.
#[async_trait]
pub trait Dialer: Debug + Send + Sync + 'static {
    /// Open a TCP connection to `addr`
    async fn dial(&self, addr: SocketAddr) -> io::Result<TcpStream>;

    /// Bind a TCP listener on `addr` (BIND)
    async fn listen_tcp(&self, addr: SocketAddr) -> io::Result<TcpListener>;

    /// Bind a UDP socket on `addr` (UDP ASSOCIATE)
    async fn listen_udp(&self, addr: SocketAddr) -> io::Result<UdpSocket>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_opts_default() {
        let opts = SocketOpts::default();
        assert!(opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(20));
        assert_eq!(opts.keepalive_interval, Some(8));
    }

    #[test]
    fn test_socket_opts_from_tcp_config() {
        let config = TcpConfig {
            nodelay: false,
            keepalive_secs: 60,
            keepalive_interval: 15,
        };
        let opts = SocketOpts::from_tcp_config(&config);
        assert!(!opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(60));
        assert_eq!(opts.keepalive_interval, Some(15));
    }

    #[test]
    fn test_socket_opts_keepalive_disabled() {
        let config = TcpConfig {
            nodelay: true,
            keepalive_secs: 0,
            keepalive_interval: 8,
        };
        let opts = SocketOpts::from_tcp_config(&config);
        assert_eq!(opts.keepalive_secs, None);
    }

    #[tokio::test]
    async fn test_socket_opts_apply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();

        SocketOpts::default().apply(&stream).unwrap();
        assert!(stream.nodelay().unwrap());
    }
}
