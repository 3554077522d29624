//! SOCKS reply builder
//!
//! Constructs SOCKS4 and SOCKS5 reply messages.

use crate::error::{ReplyStatus, SocksError};
use crate::socks::address::encode_addr;
use crate::socks::consts::*;
use crate::socks::types::{AddrSpec, SocksVersion};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Build and send a reply
///
/// # SOCKS5 Reply Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// # SOCKS4 Reply Format
///
/// ```text
/// +----+----+---------+--------+
/// | VN | CD | DSTPORT | DSTIP  |
/// +----+----+---------+--------+
/// | 1  | 1  |    2    |   4    |
/// +----+----+---------+--------+
/// ```
///
/// A missing bound address is sent as `0.0.0.0:0`.
pub async fn send_reply<S>(
    stream: &mut S,
    version: SocksVersion,
    status: ReplyStatus,
    bind_addr: Option<&AddrSpec>,
) -> Result<(), SocksError>
where
    S: AsyncWrite + Unpin,
{
    let reply = build_reply(version, status, bind_addr)?;
    stream.write_all(&reply).await?;
    stream.flush().await?;
    Ok(())
}

/// Encode a reply without sending it
pub fn build_reply(
    version: SocksVersion,
    status: ReplyStatus,
    bind_addr: Option<&AddrSpec>,
) -> Result<BytesMut, SocksError> {
    // Replies never carry a hostname
    let bind_addr = bind_addr
        .map(|addr| AddrSpec {
            fqdn: String::new(),
            ip: addr.ip,
            port: addr.port,
        })
        .unwrap_or_default();

    let mut reply = BytesMut::with_capacity(22);
    match version {
        SocksVersion::V5 => {
            reply.put_u8(SOCKS5_VERSION);
            reply.put_u8(status.into());
            reply.put_u8(SOCKS5_RESERVED);
        }
        SocksVersion::V4 => {
            reply.put_u8(SOCKS4_REPLY_VERSION);
            reply.put_u8(socks4_code(status));
        }
    }
    encode_addr(&bind_addr, version, &mut reply)?;
    Ok(reply)
}

/// SOCKS4 has a single failure code for everything except success
fn socks4_code(status: ReplyStatus) -> u8 {
    match status {
        ReplyStatus::Success => SOCKS4_REPLY_GRANTED,
        _ => SOCKS4_REPLY_REJECTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::address::decode_addr;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_build_reply_ipv4() {
        let addr = AddrSpec::ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 8080);
        let reply = build_reply(SocksVersion::V5, ReplyStatus::Success, Some(&addr)).unwrap();

        assert_eq!(reply[0], SOCKS5_VERSION);
        assert_eq!(reply[1], 0);
        assert_eq!(reply[2], SOCKS5_RESERVED);
        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV4);
        assert_eq!(&reply[4..8], &[192, 168, 1, 1]);
        assert_eq!(&reply[8..10], &8080u16.to_be_bytes());
    }

    #[test]
    fn test_build_reply_ipv6() {
        let addr = AddrSpec::ip(IpAddr::V6(Ipv6Addr::LOCALHOST), 443);
        let reply = build_reply(SocksVersion::V5, ReplyStatus::Success, Some(&addr)).unwrap();

        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV6);
        assert_eq!(reply.len(), 3 + 1 + 16 + 2);
    }

    #[test]
    fn test_build_reply_no_addr() {
        let reply = build_reply(SocksVersion::V5, ReplyStatus::RuleFailure, None).unwrap();
        assert_eq!(&reply[..], &[5, 2, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_build_reply_never_emits_fqdn() {
        let addr = AddrSpec::domain("example.com", 80);
        let reply = build_reply(SocksVersion::V5, ReplyStatus::Success, Some(&addr)).unwrap();
        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV4);
        assert_eq!(&reply[8..10], &80u16.to_be_bytes());
    }

    #[test]
    fn test_build_reply_socks4() {
        let addr = AddrSpec::ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 1080);
        let reply = build_reply(SocksVersion::V4, ReplyStatus::Success, Some(&addr)).unwrap();
        assert_eq!(&reply[..], &[0, 0x5A, 0x04, 0x38, 10, 0, 0, 1]);

        let reply = build_reply(SocksVersion::V4, ReplyStatus::ConnectionRefused, None).unwrap();
        assert_eq!(&reply[..], &[0, 0x5B, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_build_reply_various_codes() {
        let codes = [
            ReplyStatus::ServerFailure,
            ReplyStatus::NetworkUnreachable,
            ReplyStatus::HostUnreachable,
            ReplyStatus::TtlExpired,
            ReplyStatus::CommandNotSupported,
            ReplyStatus::AddrTypeNotSupported,
        ];

        for code in codes {
            let reply = build_reply(SocksVersion::V5, code, None).unwrap();
            assert_eq!(reply[1], u8::from(code));
        }
    }

    #[tokio::test]
    async fn test_reply_address_parses_with_codec() {
        let addr = AddrSpec::ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1080);
        let mut buffer = Vec::new();
        send_reply(&mut buffer, SocksVersion::V5, ReplyStatus::Success, Some(&addr))
            .await
            .unwrap();

        let mut body = &buffer[3..];
        let decoded = decode_addr(&mut body, SocksVersion::V5).await.unwrap();
        assert_eq!(decoded, addr);
    }
}
