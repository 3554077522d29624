//! Direct transport implementation
//!
//! Dials destinations with plain tokio sockets.

use super::{Dialer, SocketOpts};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Dialer that connects straight to the destination
#[derive(Debug, Clone)]
pub struct DirectDialer {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl DirectDialer {
    /// Create a new dialer with default options
    pub fn with_defaults() -> Self {
        DirectDialer {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connection timeout in use
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for DirectDialer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection timeout to {}", addr),
                )
            })??;

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", addr);

        Ok(stream)
    }

    async fn listen_tcp(&self, addr: SocketAddr) -> io::Result<TcpListener> {
        TcpListener::bind(addr).await
    }

    async fn listen_udp(&self, addr: SocketAddr) -> io::Result<UdpSocket> {
        UdpSocket::bind(addr).await
    }
}
