//! UDP datagram encapsulation for SOCKS5
//!
//! Every datagram exchanged with an associated client carries this header.

use crate::error::SocksError;
use crate::socks::address::{decode_addr, encode_addr};
use crate::socks::consts::*;
use crate::socks::types::{AddrSpec, SocksVersion};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

/// UDP packet structure for SOCKS5
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpPacket {
    /// Fragment number (0 for standalone packets)
    pub frag: u8,
    /// Destination address for client datagrams, source address for replies
    pub addr: AddrSpec,
    /// Payload
    pub data: Bytes,
}

impl UdpPacket {
    /// Create an unfragmented packet
    pub fn new(addr: AddrSpec, data: Bytes) -> Self {
        UdpPacket { frag: 0, addr, data }
    }

    /// Check if this is a fragment
    pub fn is_fragmented(&self) -> bool {
        self.frag != 0
    }
}

fn truncated(what: &str) -> SocksError {
    SocksError::Protocol(format!("UDP datagram too short for {}", what))
}

/// Parse a datagram received from the client
///
/// The address is decoded with the same codec as TCP requests; a datagram
/// that ends inside the header is a protocol error.
pub async fn parse_udp_packet(data: &[u8]) -> Result<UdpPacket, SocksError> {
    let mut buf = data;
    if buf.remaining() < 3 {
        return Err(truncated("header"));
    }

    let rsv = buf.get_u16();
    if rsv != 0 {
        return Err(SocksError::Protocol(format!(
            "invalid UDP reserved field: {:#06x}",
            rsv
        )));
    }
    let frag = buf.get_u8();

    let addr = decode_addr(&mut buf, SocksVersion::V5)
        .await
        .map_err(|e| match e {
            SocksError::Transport(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                truncated("address")
            }
            other => other,
        })?;

    Ok(UdpPacket {
        frag,
        addr,
        data: Bytes::copy_from_slice(buf),
    })
}

/// Encode a datagram for delivery to the client
pub fn encode_udp_packet(packet: &UdpPacket) -> Result<Bytes, SocksError> {
    let mut buf = BytesMut::with_capacity(4 + 1 + MAX_DOMAIN_LEN + 2 + packet.data.len());
    buf.put_u16(0);
    buf.put_u8(packet.frag);
    encode_addr(&packet.addr, SocksVersion::V5, &mut buf)?;
    buf.put_slice(&packet.data);
    Ok(buf.freeze())
}
