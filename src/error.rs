//! Error types for Socksd
//!
//! This module defines the error taxonomy of the SOCKS engine and the reply
//! status codes that errors map onto.

use std::io;
use thiserror::Error;

/// Errors produced while serving a single SOCKS control connection
#[derive(Error, Debug)]
pub enum SocksError {
    /// Short read/write, reset or any other I/O failure on the control stream
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Version byte is neither 4 nor 5
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Malformed request (reserved byte, lengths, unterminated strings)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Unknown address type in a SOCKS5 request
    #[error("address type not supported: {0}")]
    AddrTypeNotSupported(u8),

    /// Unknown or unsupported command
    #[error("command not supported: {0}")]
    CommandNotSupported(u8),

    /// Method negotiation or credential check failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The rule engine denied the request
    #[error("{0}: blocked by rules")]
    BlockedByRules(String),

    /// Destination hostname could not be resolved
    #[error("failed to resolve destination {host}: {source}")]
    Resolve {
        /// Hostname that failed to resolve
        host: String,
        /// Underlying resolver error
        source: io::Error,
    },

    /// Dialing the destination failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Destination address
        addr: String,
        /// Underlying dial error
        source: io::Error,
    },

    /// Any other failure while executing a command
    #[error("command execution failed: {0}")]
    CommandExecution(String),
}

impl SocksError {
    /// Reply owed to the client for an error raised before any reply was sent.
    ///
    /// Only parse-time failures have one; transport and authentication errors
    /// close the connection without a command reply.
    pub fn reply_status(&self) -> Option<ReplyStatus> {
        match self {
            SocksError::AddrTypeNotSupported(_) => Some(ReplyStatus::AddrTypeNotSupported),
            SocksError::CommandNotSupported(_) => Some(ReplyStatus::CommandNotSupported),
            SocksError::Protocol(_) => Some(ReplyStatus::ServerFailure),
            _ => None,
        }
    }
}

/// Reply status of a SOCKS command
///
/// Values are the SOCKS5 `REP` codes; SOCKS4 collapses them into
/// granted/rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyStatus {
    /// Command succeeded
    Success = 0x00,
    /// General SOCKS server failure
    ServerFailure = 0x01,
    /// Connection not allowed by ruleset
    RuleFailure = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddrTypeNotSupported = 0x08,
}

impl From<ReplyStatus> for u8 {
    fn from(status: ReplyStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for ReplyStatus {
    type Error = SocksError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyStatus::Success),
            0x01 => Ok(ReplyStatus::ServerFailure),
            0x02 => Ok(ReplyStatus::RuleFailure),
            0x03 => Ok(ReplyStatus::NetworkUnreachable),
            0x04 => Ok(ReplyStatus::HostUnreachable),
            0x05 => Ok(ReplyStatus::ConnectionRefused),
            0x06 => Ok(ReplyStatus::TtlExpired),
            0x07 => Ok(ReplyStatus::CommandNotSupported),
            0x08 => Ok(ReplyStatus::AddrTypeNotSupported),
            _ => Err(SocksError::Protocol(format!("unknown reply code: {}", value))),
        }
    }
}

/// Map a dial failure onto the nearest reply status
impl From<&io::Error> for ReplyStatus {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ReplyStatus::ConnectionRefused,
            io::ErrorKind::NetworkUnreachable => ReplyStatus::NetworkUnreachable,
            io::ErrorKind::TimedOut => ReplyStatus::TtlExpired,
            _ => ReplyStatus::HostUnreachable,
        }
    }
}
