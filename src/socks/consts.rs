//! SOCKS protocol constants
//!
//! Defines the wire constants of SOCKS4, SOCKS4a and SOCKS5.

/// SOCKS4 protocol version
pub const SOCKS4_VERSION: u8 = 0x04;

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// GSSAPI authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Username/password sub-negotiation status
/// Credentials accepted
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;
/// Credentials rejected
pub const SOCKS5_AUTH_FAILURE: u8 = 0x01;

// Commands (shared by SOCKS4 and SOCKS5)
/// TCP CONNECT command
pub const SOCKS_CMD_CONNECT: u8 = 0x01;
/// TCP BIND command
pub const SOCKS_CMD_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (SOCKS5 only)
pub const SOCKS_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// SOCKS4 reply codes
/// SOCKS4 reply version byte
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;
/// Request granted
pub const SOCKS4_REPLY_GRANTED: u8 = 0x5A;
/// Request rejected or failed
pub const SOCKS4_REPLY_REJECTED: u8 = 0x5B;
/// Rejected because identd is unreachable
pub const SOCKS4_REPLY_IDENTD_UNREACHABLE: u8 = 0x5C;
/// Rejected because identd reported a different user-id
pub const SOCKS4_REPLY_IDENTD_MISMATCH: u8 = 0x5D;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Buffer sizes
/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
/// Maximum length of a NUL-terminated SOCKS4 field
pub const MAX_SOCKS4_FIELD_LEN: usize = 255;
/// Maximum UDP datagram size
pub const MAX_UDP_PACKET: usize = 65535;
