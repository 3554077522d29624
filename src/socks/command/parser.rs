//! SOCKS request parser
//!
//! Parses SOCKS4/4a and SOCKS5 requests into a version-normalized
//! [`Request`].

use crate::error::SocksError;
use crate::socks::address::{decode_addr, read_nul_terminated};
use crate::socks::auth::{AuthContext, AuthMethod};
use crate::socks::consts::*;
use crate::socks::types::{Command, Request, SocksVersion};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Parse a SOCKS request from the stream
///
/// # SOCKS4/4a Request Format (after the VN byte)
///
/// ```text
/// +----+---------+--------+--------------+------------------------+
/// | CD | DSTPORT | DSTIP  | USERID, NUL  | [DSTHOST, NUL] (4a)    |
/// +----+---------+--------+--------------+------------------------+
/// | 1  |    2    |   4    |   Variable   | iff DSTIP = 0.0.0.x    |
/// +----+---------+--------+--------------+------------------------+
/// ```
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// SOCKS5 authentication must already have happened; its outcome is attached
/// by the caller through [`Request::auth_context`]. For SOCKS4 the user-ID
/// becomes the `"Username"` payload entry.
pub async fn new_request<S>(stream: &mut S, version: SocksVersion) -> Result<Request, SocksError>
where
    S: AsyncRead + Unpin,
{
    let request = match version {
        SocksVersion::V4 => parse_socks4(stream).await?,
        SocksVersion::V5 => parse_socks5(stream).await?,
    };

    tracing::debug!("Parsed request: {}", request);

    Ok(request)
}

async fn parse_socks4<S>(stream: &mut S) -> Result<Request, SocksError>
where
    S: AsyncRead + Unpin,
{
    let cmd_byte = stream.read_u8().await?;
    let mut dest_addr = decode_addr(stream, SocksVersion::V4).await?;
    let user_id = read_nul_terminated(stream, "user-id").await?;

    if dest_addr.is_socks4a_sentinel() {
        let host = read_nul_terminated(stream, "hostname").await?;
        if host.is_empty() {
            return Err(SocksError::Protocol("empty SOCKS4a hostname".to_string()));
        }
        dest_addr.fqdn = host;
        dest_addr.ip = None;
    }

    let command = Command::from_byte(cmd_byte, SocksVersion::V4)
        .ok_or(SocksError::CommandNotSupported(cmd_byte))?;

    let auth_context = if user_id.is_empty() {
        AuthContext::no_auth()
    } else {
        AuthContext::with_username(AuthMethod::NoAuth, user_id)
    };

    Ok(Request {
        version: SocksVersion::V4,
        command,
        dest_addr,
        auth_context,
        remote_addr: None,
    })
}

async fn parse_socks5<S>(stream: &mut S) -> Result<Request, SocksError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 3];
    stream.read_exact(&mut header).await?;

    let version = header[0];
    let cmd_byte = header[1];
    let reserved = header[2];

    if version != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(version));
    }

    if reserved != SOCKS5_RESERVED {
        return Err(SocksError::Protocol(format!(
            "reserved byte must be zero, got {}",
            reserved
        )));
    }

    let dest_addr = decode_addr(stream, SocksVersion::V5).await?;

    let command = Command::from_byte(cmd_byte, SocksVersion::V5)
        .ok_or(SocksError::CommandNotSupported(cmd_byte))?;

    Ok(Request {
        version: SocksVersion::V5,
        command,
        dest_addr,
        auth_context: AuthContext::no_auth(),
        remote_addr: None,
    })
}
