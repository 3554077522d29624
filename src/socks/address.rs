//! Address codec
//!
//! Encodes and decodes destination and bound addresses in the SOCKS4/4a and
//! SOCKS5 wire formats.
//!
//! # SOCKS5
//!
//! ```text
//! +------+----------+----------+
//! | ATYP | DST.ADDR | DST.PORT |
//! +------+----------+----------+
//! |  1   | Variable |    2     |
//! +------+----------+----------+
//! ```
//!
//! # SOCKS4
//!
//! ```text
//! +----------+--------+
//! | DST.PORT | DST.IP |
//! +----------+--------+
//! |    2     |   4    |
//! +----------+--------+
//! ```
//!
//! Hostnames are carried verbatim; resolving them is the caller's job.

use super::consts::*;
use super::types::{AddrSpec, SocksVersion};
use crate::error::SocksError;
use bytes::{BufMut, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Decode an address in the given version's request layout
///
/// For SOCKS4 only the fixed port and IPv4 fields are read; the 4a hostname
/// follows the user-ID and is read by the request parser.
pub async fn decode_addr<R>(reader: &mut R, version: SocksVersion) -> Result<AddrSpec, SocksError>
where
    R: AsyncRead + Unpin,
{
    match version {
        SocksVersion::V4 => {
            let port = reader.read_u16().await?;
            let mut ip = [0u8; 4];
            reader.read_exact(&mut ip).await?;
            Ok(AddrSpec::ip(IpAddr::V4(Ipv4Addr::from(ip)), port))
        }
        SocksVersion::V5 => {
            let addr_type = reader.read_u8().await?;
            decode_socks5_body(reader, addr_type).await
        }
    }
}

/// Decode the SOCKS5 address body that follows an already-read ATYP byte
pub async fn decode_socks5_body<R>(reader: &mut R, addr_type: u8) -> Result<AddrSpec, SocksError>
where
    R: AsyncRead + Unpin,
{
    let mut addr = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut ip = [0u8; 4];
            reader.read_exact(&mut ip).await?;
            AddrSpec::ip(IpAddr::V4(Ipv4Addr::from(ip)), 0)
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut ip = [0u8; 16];
            reader.read_exact(&mut ip).await?;
            AddrSpec::ip(IpAddr::V6(Ipv6Addr::from(ip)), 0)
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = reader.read_u8().await? as usize;
            if len == 0 {
                return Err(SocksError::Protocol("empty domain name".to_string()));
            }
            let mut domain = vec![0u8; len];
            reader.read_exact(&mut domain).await?;
            let domain = String::from_utf8(domain)
                .map_err(|_| SocksError::Protocol("invalid UTF-8 in domain name".to_string()))?;
            AddrSpec::domain(domain, 0)
        }

        other => return Err(SocksError::AddrTypeNotSupported(other)),
    };

    addr.port = reader.read_u16().await?;
    Ok(addr)
}

/// Encode an address in the given version's layout
///
/// SOCKS5 emits `ATYP ADDR PORT`, including FQDNs. SOCKS4 emits
/// `PORT IPv4`; anything that is not IPv4 encodes as `0.0.0.0`.
///
/// A hostname longer than [`MAX_DOMAIN_LEN`] bytes cannot be represented
/// and is rejected.
pub fn encode_addr(
    addr: &AddrSpec,
    version: SocksVersion,
    buf: &mut BytesMut,
) -> Result<(), SocksError> {
    match version {
        SocksVersion::V4 => {
            buf.put_u16(addr.port);
            match addr.ip {
                Some(IpAddr::V4(v4)) => buf.put_slice(&v4.octets()),
                _ => buf.put_slice(&Ipv4Addr::UNSPECIFIED.octets()),
            }
        }
        SocksVersion::V5 => {
            if !addr.fqdn.is_empty() {
                let name = addr.fqdn.as_bytes();
                if name.len() > MAX_DOMAIN_LEN {
                    return Err(SocksError::Protocol(format!(
                        "domain name too long: {} bytes",
                        name.len()
                    )));
                }
                buf.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
                buf.put_u8(name.len() as u8);
                buf.put_slice(name);
            } else {
                match addr.ip {
                    Some(IpAddr::V6(v6)) => {
                        buf.put_u8(SOCKS5_ADDR_TYPE_IPV6);
                        buf.put_slice(&v6.octets());
                    }
                    Some(IpAddr::V4(v4)) => {
                        buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                        buf.put_slice(&v4.octets());
                    }
                    None => {
                        buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                        buf.put_slice(&Ipv4Addr::UNSPECIFIED.octets());
                    }
                }
            }
            buf.put_u16(addr.port);
        }
    }
    Ok(())
}

/// Read a NUL-terminated SOCKS4 field, bounded to [`MAX_SOCKS4_FIELD_LEN`]
pub async fn read_nul_terminated<R>(reader: &mut R, what: &str) -> Result<String, SocksError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let byte = reader.read_u8().await?;
        if byte == 0 {
            break;
        }
        if buf.len() == MAX_SOCKS4_FIELD_LEN {
            return Err(SocksError::Protocol(format!("{} too long", what)));
        }
        buf.push(byte);
    }
    String::from_utf8(buf).map_err(|_| SocksError::Protocol(format!("invalid UTF-8 in {}", what)))
}
