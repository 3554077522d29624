//! Hostname resolution

use super::types::AddrSpec;
use crate::error::SocksError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::{IpAddr, SocketAddr};

/// Resolves destination hostnames to IP addresses
#[async_trait]
pub trait Resolver: Send + Sync + Debug {
    /// Resolve a hostname to a single address
    async fn resolve(&self, host: &str) -> io::Result<IpAddr>;
}

/// Resolver backed by the system resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        tokio::net::lookup_host((host, 0))
            .await?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no addresses found for {}", host),
                )
            })
    }
}

/// Turn a destination into a socket address, resolving hostnames
pub async fn resolve_addr(addr: &AddrSpec, resolver: &dyn Resolver) -> Result<SocketAddr, SocksError> {
    if let Some(socket_addr) = addr.socket_addr() {
        return Ok(socket_addr);
    }
    if addr.fqdn.is_empty() {
        return Err(SocksError::Protocol("destination has no address".to_string()));
    }

    let ip = resolver
        .resolve(&addr.fqdn)
        .await
        .map_err(|source| SocksError::Resolve {
            host: addr.fqdn.clone(),
            source,
        })?;
    tracing::debug!("Resolved {} to {}", addr.fqdn, ip);
    Ok(SocketAddr::new(ip, addr.port))
}
