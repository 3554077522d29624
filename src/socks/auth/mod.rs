//! SOCKS authentication module
//!
//! Handles SOCKS5 method negotiation and username/password authentication.
//! SOCKS4 carries no negotiation; its user-ID is recorded as metadata.

mod password;

pub use password::{CredentialStore, PasswordAuth, StaticCredentials};

use super::consts::*;
use crate::error::SocksError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Payload key holding the client's username or SOCKS4 user-ID
pub const USERNAME_KEY: &str = "Username";

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    NoAuth,
    /// Username/password authentication
    UserPass,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::UserPass => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => Some(AuthMethod::NoAuth),
            SOCKS5_AUTH_METHOD_PASSWORD => Some(AuthMethod::UserPass),
            _ => None,
        }
    }
}

/// Outcome of authentication, attached to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Method that was negotiated
    pub method: AuthMethod,
    /// Method-specific metadata, e.g. `"Username"`
    pub payload: HashMap<String, String>,
}

impl AuthContext {
    /// Context for an unauthenticated client
    pub fn no_auth() -> Self {
        AuthContext {
            method: AuthMethod::NoAuth,
            payload: HashMap::new(),
        }
    }

    /// Context carrying a username
    pub fn with_username(method: AuthMethod, username: impl Into<String>) -> Self {
        let mut payload = HashMap::new();
        payload.insert(USERNAME_KEY.to_string(), username.into());
        AuthContext { method, payload }
    }

    /// Username, if any
    pub fn username(&self) -> Option<&str> {
        self.payload.get(USERNAME_KEY).map(String::as_str)
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::no_auth()
    }
}

/// Negotiates one authentication method out of a configured set
#[derive(Debug, Clone)]
pub struct Authenticator {
    methods: Vec<AuthMethod>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl Authenticator {
    /// Accept unauthenticated clients only
    pub fn no_auth() -> Self {
        Authenticator {
            methods: vec![AuthMethod::NoAuth],
            credentials: None,
        }
    }

    /// Offer username/password, and optionally no-auth as well
    pub fn with_credentials(credentials: Arc<dyn CredentialStore>, required: bool) -> Self {
        let methods = if required {
            vec![AuthMethod::UserPass]
        } else {
            vec![AuthMethod::NoAuth, AuthMethod::UserPass]
        };
        Authenticator {
            methods,
            credentials: Some(credentials),
        }
    }

    /// Methods this authenticator accepts
    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    /// Whether clients may proceed without credentials (SOCKS4 included)
    pub fn accepts_no_auth(&self) -> bool {
        self.methods.contains(&AuthMethod::NoAuth)
    }

    /// Perform SOCKS5 method negotiation and authentication
    ///
    /// The leading version byte has already been consumed by the caller.
    ///
    /// 1. Read the client's offered methods
    /// 2. Pick the first offered method the server supports
    /// 3. Run the username/password exchange if that was picked
    pub async fn authenticate<S>(&self, stream: &mut S) -> Result<AuthContext, SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let num_methods = stream.read_u8().await?;
        if num_methods == 0 {
            stream
                .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
                .await?;
            stream.flush().await?;
            return Err(SocksError::AuthenticationFailed(
                "no authentication methods provided".to_string(),
            ));
        }

        let mut offered = vec![0u8; num_methods as usize];
        stream.read_exact(&mut offered).await?;

        let selected = self.select_method(&offered);

        stream
            .write_all(&[
                SOCKS5_VERSION,
                selected
                    .map(AuthMethod::to_byte)
                    .unwrap_or(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE),
            ])
            .await?;
        stream.flush().await?;

        match selected {
            Some(AuthMethod::NoAuth) => Ok(AuthContext::no_auth()),
            Some(AuthMethod::UserPass) => {
                let credentials = self.credentials.as_deref().ok_or_else(|| {
                    SocksError::AuthenticationFailed("no credentials configured".to_string())
                })?;
                let username = PasswordAuth::authenticate(stream, credentials).await?;
                Ok(AuthContext::with_username(AuthMethod::UserPass, username))
            }
            None => Err(SocksError::AuthenticationFailed(format!(
                "no acceptable authentication method, client offered {:?}",
                offered
            ))),
        }
    }

    /// First client-offered method that the server supports
    fn select_method(&self, offered: &[u8]) -> Option<AuthMethod> {
        offered
            .iter()
            .filter_map(|byte| AuthMethod::from_byte(*byte))
            .find(|method| self.methods.contains(method))
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::no_auth()
    }
}
