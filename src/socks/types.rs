//! SOCKS type definitions
//!
//! Defines the version-normalized types shared by the SOCKS4 and SOCKS5 code
//! paths.

use super::auth::AuthContext;
use super::consts::*;
use crate::error::SocksError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// SOCKS protocol version, selecting the wire codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    /// SOCKS4 and SOCKS4a
    V4,
    /// SOCKS5
    V5,
}

impl SocksVersion {
    /// Parse the leading version byte of a connection
    pub fn from_byte(byte: u8) -> Result<Self, SocksError> {
        match byte {
            SOCKS4_VERSION => Ok(SocksVersion::V4),
            SOCKS5_VERSION => Ok(SocksVersion::V5),
            other => Err(SocksError::UnsupportedVersion(other)),
        }
    }

    /// Version byte on the wire
    pub fn to_byte(self) -> u8 {
        match self {
            SocksVersion::V4 => SOCKS4_VERSION,
            SocksVersion::V5 => SOCKS5_VERSION,
        }
    }
}

impl fmt::Display for SocksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksVersion::V4 => write!(f, "SOCKS4"),
            SocksVersion::V5 => write!(f, "SOCKS5"),
        }
    }
}

/// SOCKS command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for an inbound connection from target
    Bind,
    /// UDP ASSOCIATE - establish UDP relay (SOCKS5 only)
    Associate,
}

impl Command {
    /// Parse a command byte for the given protocol version
    pub fn from_byte(byte: u8, version: SocksVersion) -> Option<Self> {
        match (byte, version) {
            (SOCKS_CMD_CONNECT, _) => Some(Command::Connect),
            (SOCKS_CMD_BIND, _) => Some(Command::Bind),
            (SOCKS_CMD_UDP_ASSOCIATE, SocksVersion::V5) => Some(Command::Associate),
            _ => None,
        }
    }

    /// Convert Command to byte
    pub fn to_byte(self) -> u8 {
        match self {
            Command::Connect => SOCKS_CMD_CONNECT,
            Command::Bind => SOCKS_CMD_BIND,
            Command::Associate => SOCKS_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "CONNECT"),
            Command::Bind => write!(f, "BIND"),
            Command::Associate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Destination or bound address
///
/// A destination carries either `fqdn` or `ip`, never both. Reply addresses
/// only ever carry `ip`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrSpec {
    /// Hostname, empty when the address is a literal IP
    pub fqdn: String,
    /// Literal IP address
    pub ip: Option<IpAddr>,
    /// Port number
    pub port: u16,
}

impl AddrSpec {
    /// Create an address from a hostname and port
    pub fn domain(fqdn: impl Into<String>, port: u16) -> Self {
        AddrSpec {
            fqdn: fqdn.into(),
            ip: None,
            port,
        }
    }

    /// Create an address from an IP and port
    pub fn ip(ip: IpAddr, port: u16) -> Self {
        AddrSpec {
            fqdn: String::new(),
            ip: Some(ip),
            port,
        }
    }

    /// Render as `host:port`, preferring the FQDN over the IP
    pub fn address(&self) -> String {
        if !self.fqdn.is_empty() {
            return format!("{}:{}", self.fqdn, self.port);
        }
        let ip = self.ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port).to_string()
    }

    /// Socket address when the destination is a literal IP
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        if !self.fqdn.is_empty() {
            return None;
        }
        self.ip.map(|ip| SocketAddr::new(ip, self.port))
    }

    /// Whether the address is an IPv4 value in the SOCKS4a sentinel range
    /// `0.0.0.1`-`0.0.0.255`
    pub fn is_socks4a_sentinel(&self) -> bool {
        match self.ip {
            Some(IpAddr::V4(v4)) => {
                let o = v4.octets();
                o[0] == 0 && o[1] == 0 && o[2] == 0 && o[3] != 0
            }
            _ => false,
        }
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.fqdn.is_empty(), self.ip) {
            (false, Some(ip)) => write!(f, "{} ({}):{}", self.fqdn, ip, self.port),
            _ => write!(f, "{}", self.address()),
        }
    }
}

impl From<SocketAddr> for AddrSpec {
    fn from(addr: SocketAddr) -> Self {
        AddrSpec::ip(addr.ip(), addr.port())
    }
}

/// A parsed, version-normalized SOCKS request
///
/// Built once per control connection and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Request {
    /// Protocol version the client spoke
    pub version: SocksVersion,
    /// Requested command
    pub command: Command,
    /// Destination address
    pub dest_addr: AddrSpec,
    /// Authentication outcome
    pub auth_context: AuthContext,
    /// Address of the client, when known
    pub remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Attach the client address of the control connection
    pub fn with_remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} to {}", self.version, self.command, self.dest_addr)
    }
}
