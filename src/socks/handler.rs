//! Main SOCKS handler
//!
//! This module provides the per-connection entry point. It orchestrates
//! version detection, authentication, request parsing, rule checks and
//! command dispatch.

use crate::config::SocksConfig;
use crate::error::{ReplyStatus, SocksError};
use crate::socks::auth::{Authenticator, StaticCredentials};
use crate::socks::bind::handle_bind;
use crate::socks::command::{new_request, send_reply};
use crate::socks::resolver::{DnsResolver, Resolver};
use crate::socks::rules::{PermitCommand, RuleEngine};
use crate::socks::tcp_relay::handle_connect;
use crate::socks::types::{Command, Request, SocksVersion};
use crate::socks::udp::handle_associate;
use crate::transport::{DirectDialer, Dialer};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, warn};

/// Addresses of an accepted control connection
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnInfo {
    /// Client address
    pub remote_addr: Option<SocketAddr>,
    /// Server-side address the client connected to
    pub local_addr: Option<SocketAddr>,
}

/// Serves SOCKS4, SOCKS4a and SOCKS5 control connections
///
/// Collaborators are shared trait objects, so a handler is cheap to clone
/// into every connection task.
#[derive(Debug, Clone)]
pub struct SocksHandler {
    config: SocksConfig,
    authenticator: Authenticator,
    rules: Arc<dyn RuleEngine>,
    resolver: Arc<dyn Resolver>,
    dialer: Arc<dyn Dialer>,
}

impl SocksHandler {
    /// Build a handler with collaborators derived from the configuration
    ///
    /// Credentials enable username/password authentication, the `allow_*`
    /// switches become a [`PermitCommand`] rule set and `request_timeout`
    /// bounds outbound dials.
    pub fn new(config: SocksConfig) -> Self {
        let authenticator = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Authenticator::with_credentials(
                Arc::new(StaticCredentials::new().with_user(username.clone(), password.clone())),
                config.auth_required,
            ),
            _ => Authenticator::no_auth(),
        };

        let rules = PermitCommand {
            enable_connect: config.allow_connect,
            enable_bind: config.allow_bind,
            enable_associate: config.allow_udp,
        };

        let dialer = DirectDialer::with_defaults()
            .with_connect_timeout(Duration::from_secs(config.request_timeout));

        SocksHandler {
            config,
            authenticator,
            rules: Arc::new(rules),
            resolver: Arc::new(DnsResolver),
            dialer: Arc::new(dialer),
        }
    }

    /// Replace the authenticator
    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replace the rule engine
    pub fn with_rules(mut self, rules: Arc<dyn RuleEngine>) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the outbound dialer
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &SocksConfig {
        &self.config
    }

    /// Serve one control connection from its first byte
    ///
    /// # Protocol Flow
    ///
    /// 1. Version byte
    /// 2. SOCKS5 method negotiation and authentication
    /// 3. Request parsing
    /// 4. Rule check and command execution
    ///
    /// Steps 1-3 must finish within `request_timeout`.
    pub async fn handle_connection<S>(&self, mut stream: S, conn: ConnInfo) -> Result<(), SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let timeout = Duration::from_secs(self.config.request_timeout);
        let request = match tokio::time::timeout(timeout, self.read_request(&mut stream)).await {
            Ok(request) => request?,
            Err(_) => {
                return Err(SocksError::Transport(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("SOCKS handshake not completed within {:?}", timeout),
                )))
            }
        };
        let request = request.with_remote_addr(conn.remote_addr);

        info!(
            "{} from {}",
            request,
            conn.remote_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        self.handle_request(request, stream, conn.local_addr.map(|addr| addr.ip()))
            .await
    }

    /// Negotiate and parse the request, replying to malformed ones
    async fn read_request<S>(&self, stream: &mut S) -> Result<Request, SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let version = SocksVersion::from_byte(stream.read_u8().await?)?;

        let auth_context = match version {
            SocksVersion::V5 => {
                let context = self.authenticator.authenticate(stream).await?;
                debug!("Authentication completed with method: {:?}", context.method);
                Some(context)
            }
            SocksVersion::V4 => None,
        };

        let request = match new_request(stream, version).await {
            Ok(request) => request,
            Err(e) => {
                if let Some(status) = e.reply_status() {
                    warn!("Rejecting malformed {} request: {}", version, e);
                    if let Err(send_err) = send_reply(stream, version, status, None).await {
                        debug!("Failed to send {:?} reply: {}", status, send_err);
                    }
                }
                return Err(e);
            }
        };

        match auth_context {
            Some(auth_context) => Ok(Request {
                auth_context,
                ..request
            }),
            None if !self.authenticator.accepts_no_auth() => {
                warn!("Rejecting SOCKS4 request, authentication is required");
                send_reply(stream, version, ReplyStatus::RuleFailure, None).await?;
                Err(SocksError::AuthenticationFailed(
                    "SOCKS4 clients cannot authenticate".to_string(),
                ))
            }
            None => Ok(request),
        }
    }

    /// Check a parsed request against the rules and execute it
    ///
    /// `local_ip` is the server-side address of the control connection;
    /// BIND and UDP ASSOCIATE listen on it.
    pub async fn handle_request<S>(
        &self,
        request: Request,
        mut stream: S,
        local_ip: Option<IpAddr>,
    ) -> Result<(), SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if !self.rules.allow(&request) {
            warn!("{} denied by rules", request);
            send_reply(&mut stream, request.version, ReplyStatus::RuleFailure, None).await?;
            return Err(SocksError::BlockedByRules(request.to_string()));
        }

        match request.command {
            Command::Connect => {
                handle_connect(stream, &request, self.resolver.as_ref(), self.dialer.as_ref()).await
            }
            Command::Bind => {
                handle_bind(
                    stream,
                    &request,
                    local_ip,
                    self.dialer.as_ref(),
                    Duration::from_secs(self.config.bind_timeout),
                )
                .await
            }
            Command::Associate => {
                handle_associate(
                    stream,
                    &request,
                    local_ip,
                    self.resolver.clone(),
                    self.dialer.clone(),
                )
                .await
            }
        }
    }
}

impl Default for SocksHandler {
    fn default() -> Self {
        Self::new(SocksConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::auth::AuthContext;
    use crate::socks::rules::{PermitAll, PermitNone};
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_ping_pong() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(b"pong").await.unwrap();
        });
        addr
    }

    fn connect_request_bytes(target: SocketAddr) -> Vec<u8> {
        let mut buf = vec![5, 1, 0, 1, 127, 0, 0, 1];
        buf.extend_from_slice(&target.port().to_be_bytes());
        buf
    }

    #[tokio::test]
    async fn test_request_connect() {
        let target = spawn_ping_pong().await;
        let handler = SocksHandler::default().with_rules(Arc::new(PermitAll));

        let (mut client, mut server) = duplex(1024);
        client.write_all(&connect_request_bytes(target)).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        let request = new_request(&mut server, SocksVersion::V5).await.unwrap();
        let handle = tokio::spawn(async move { handler.handle_request(request, server, None).await });

        let mut out = [0u8; 14];
        client.read_exact(&mut out).await.unwrap();

        // Ignore the port
        out[8] = 0;
        out[9] = 0;
        assert_eq!(&out, &[5, 0, 0, 1, 127, 0, 0, 1, 0, 0, b'p', b'o', b'n', b'g']);

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_request_connect_rule_fail() {
        let target = spawn_ping_pong().await;
        let handler = SocksHandler::default().with_rules(Arc::new(PermitNone));

        let (mut client, mut server) = duplex(1024);
        client.write_all(&connect_request_bytes(target)).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        let request = new_request(&mut server, SocksVersion::V5).await.unwrap();
        let err = handler.handle_request(request, server, None).await.unwrap_err();
        assert!(err.to_string().contains("blocked by rules"));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![5, 2, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_handle_associate_closure() {
        let handler = SocksHandler::default();
        let (mut client, server) = duplex(1024);

        let request = Request {
            version: SocksVersion::V5,
            command: Command::Associate,
            dest_addr: "127.0.0.1:1234".parse::<SocketAddr>().unwrap().into(),
            auth_context: AuthContext::no_auth(),
            remote_addr: None,
        };

        let mut handle =
            tokio::spawn(async move { handler.handle_request(request, server, None).await });

        let mut reply = [0u8; 10];
        tokio::time::timeout(Duration::from_millis(100), client.read_exact(&mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply[1], u8::from(ReplyStatus::Success));

        // Still blocking while the control connection is open
        assert!(tokio::time::timeout(Duration::from_millis(100), &mut handle)
            .await
            .is_err());

        drop(client);

        let result = tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connection_socks5_no_auth() {
        let target = spawn_ping_pong().await;
        let handler = SocksHandler::default();

        let (mut client, server) = duplex(1024);
        let handle = tokio::spawn(async move {
            handler.handle_connection(server, ConnInfo::default()).await
        });

        client.write_all(&[5, 1, 0]).await.unwrap();
        let mut method = [0u8; 2];
        client.read_exact(&mut method).await.unwrap();
        assert_eq!(method, [5, 0]);

        client.write_all(&connect_request_bytes(target)).await.unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..4], &[5, 0, 0, 1]);

        client.write_all(b"ping").await.unwrap();
        let mut pong = [0u8; 4];
        client.read_exact(&mut pong).await.unwrap();
        assert_eq!(&pong, b"pong");

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_connection_socks5_password() {
        let target = spawn_ping_pong().await;
        let handler = SocksHandler::new(SocksConfig {
            auth_required: true,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        });

        let (mut client, server) = duplex(1024);
        let handle = tokio::spawn(async move {
            handler.handle_connection(server, ConnInfo::default()).await
        });

        client.write_all(&[5, 2, 0, 2]).await.unwrap();
        let mut method = [0u8; 2];
        client.read_exact(&mut method).await.unwrap();
        assert_eq!(method, [5, 2]);

        client
            .write_all(&[1, 4, b'u', b's', b'e', b'r', 4, b'p', b'a', b's', b's'])
            .await
            .unwrap();
        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [1, 0]);

        client.write_all(&connect_request_bytes(target)).await.unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0);

        client.write_all(b"ping").await.unwrap();
        let mut pong = [0u8; 4];
        client.read_exact(&mut pong).await.unwrap();
        assert_eq!(&pong, b"pong");

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_connection_socks5_bad_password() {
        let handler = SocksHandler::new(SocksConfig {
            auth_required: true,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        });

        let (mut client, server) = duplex(1024);
        client.write_all(&[5, 1, 2]).await.unwrap();
        client
            .write_all(&[1, 4, b'u', b's', b'e', b'r', 5, b'w', b'r', b'o', b'n', b'g'])
            .await
            .unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::AuthenticationFailed(_)));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![5, 2, 1, 1]);
    }

    #[tokio::test]
    async fn test_connection_addr_type_not_supported() {
        let handler = SocksHandler::default();
        let (mut client, server) = duplex(1024);
        client.write_all(&[5, 1, 0, 5, 1, 0, 9]).await.unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::AddrTypeNotSupported(9)));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![5, 0, 5, 8, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_connection_command_not_supported() {
        let handler = SocksHandler::default();
        let (mut client, server) = duplex(1024);
        client
            .write_all(&[5, 1, 0, 5, 9, 0, 1, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::CommandNotSupported(9)));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(&out[2..4], &[5, 7]);
    }

    #[tokio::test]
    async fn test_connection_bind_disabled_by_default() {
        let handler = SocksHandler::default();
        let (mut client, server) = duplex(1024);
        client
            .write_all(&[5, 1, 0, 5, 2, 0, 1, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::BlockedByRules(_)));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(&out[2..], &[5, 2, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_connection_socks4_connect() {
        let target = spawn_ping_pong().await;
        let handler = SocksHandler::default();

        let (mut client, server) = duplex(1024);
        let handle = tokio::spawn(async move {
            handler.handle_connection(server, ConnInfo::default()).await
        });

        let mut request = vec![4, 1];
        request.extend_from_slice(&target.port().to_be_bytes());
        request.extend_from_slice(&[127, 0, 0, 1, b'b', b'o', b'b', 0]);
        client.write_all(&request).await.unwrap();

        let mut reply = [0u8; 8];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..2], &[0x00, 0x5A]);

        client.write_all(b"ping").await.unwrap();
        let mut pong = [0u8; 4];
        client.read_exact(&mut pong).await.unwrap();
        assert_eq!(&pong, b"pong");

        drop(client);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_connection_socks4_rejected_when_auth_required() {
        let handler = SocksHandler::new(SocksConfig {
            auth_required: true,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        });

        let (mut client, server) = duplex(1024);
        client
            .write_all(&[4, 1, 0, 80, 127, 0, 0, 1, 0])
            .await
            .unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::AuthenticationFailed(_)));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![0x00, 0x5B, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_connection_unsupported_version() {
        let handler = SocksHandler::default();
        let (mut client, server) = duplex(1024);
        client.write_all(&[6, 1, 0]).await.unwrap();

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::UnsupportedVersion(6)));
    }

    #[tokio::test]
    async fn test_connection_handshake_timeout() {
        let handler = SocksHandler::new(SocksConfig {
            request_timeout: 1,
            ..Default::default()
        });
        let (_client, server) = duplex(1024);

        let err = handler
            .handle_connection(server, ConnInfo::default())
            .await
            .unwrap_err();
        match err {
            SocksError::Transport(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error: {}", other),
        }
    }
}
