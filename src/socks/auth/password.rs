//! Username/password authentication handler
//!
//! Implements RFC 1929 username/password authentication for SOCKS5.

use crate::error::SocksError;
use crate::socks::consts::{SOCKS5_AUTH_FAILURE, SOCKS5_AUTH_SUCCESS, SOCKS5_AUTH_VERSION};
use std::collections::HashMap;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Source of truth for username/password checks
pub trait CredentialStore: Send + Sync + Debug {
    /// Whether the pair is valid
    fn valid(&self, username: &str, password: &str) -> bool;
}

/// In-memory credential table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    /// Create an empty credential table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, replacing any previous password
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    /// Number of configured users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is configured
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for StaticCredentials {
    fn valid(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .map(|expected| expected == password)
            .unwrap_or(false)
    }
}

/// Username/password authentication handler
pub struct PasswordAuth;

impl PasswordAuth {
    /// Perform username/password authentication
    ///
    /// Returns the authenticated username.
    ///
    /// # Protocol
    ///
    /// Client sends:
    /// ```text
    /// +----+------+----------+------+----------+
    /// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    /// +----+------+----------+------+----------+
    /// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    /// +----+------+----------+------+----------+
    /// ```
    ///
    /// Server responds:
    /// ```text
    /// +----+--------+
    /// |VER | STATUS |
    /// +----+--------+
    /// | 1  |   1    |
    /// +----+--------+
    /// ```
    pub async fn authenticate<S>(
        stream: &mut S,
        credentials: &dyn CredentialStore,
    ) -> Result<String, SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let version = stream.read_u8().await?;
        if version != SOCKS5_AUTH_VERSION {
            send_auth_result(stream, SOCKS5_AUTH_FAILURE).await?;
            return Err(SocksError::AuthenticationFailed(format!(
                "invalid auth version: {}",
                version
            )));
        }

        let username = read_field(stream).await?;
        let password = read_field(stream).await?;

        let (username, password) = match (String::from_utf8(username), String::from_utf8(password)) {
            (Ok(username), Ok(password)) => (username, password),
            _ => {
                send_auth_result(stream, SOCKS5_AUTH_FAILURE).await?;
                return Err(SocksError::AuthenticationFailed(
                    "invalid UTF-8 in credentials".to_string(),
                ));
            }
        };

        if username.is_empty() {
            send_auth_result(stream, SOCKS5_AUTH_FAILURE).await?;
            return Err(SocksError::AuthenticationFailed(
                "invalid username length: 0".to_string(),
            ));
        }

        if credentials.valid(&username, &password) {
            send_auth_result(stream, SOCKS5_AUTH_SUCCESS).await?;
            tracing::debug!("Authentication successful for user: {}", username);
            Ok(username)
        } else {
            send_auth_result(stream, SOCKS5_AUTH_FAILURE).await?;
            Err(SocksError::AuthenticationFailed(format!(
                "invalid credentials for user: {}",
                username
            )))
        }
    }
}

/// Read a length-prefixed field
async fn read_field<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Vec<u8>, SocksError> {
    let len = stream.read_u8().await? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Send authentication result to client
async fn send_auth_result<S: AsyncWrite + Unpin>(stream: &mut S, status: u8) -> Result<(), SocksError> {
    stream.write_all(&[SOCKS5_AUTH_VERSION, status]).await?;
    stream.flush().await?;
    Ok(())
}
