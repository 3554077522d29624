//! TCP accept loop
//!
//! Accepts control connections and serves each one on its own task until a
//! shutdown signal arrives.

use crate::config::ServerConfig;
use crate::socks::{Authenticator, ConnInfo, Resolver, RuleEngine, SocksHandler};
use crate::transport::{Dialer, DirectDialer, SocketOpts};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// SOCKS server bound to a configuration
#[derive(Debug)]
pub struct Server {
    listen_addr: String,
    socket_opts: SocketOpts,
    handler: Arc<SocksHandler>,
}

impl Server {
    /// Start building a server from its configuration
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder {
            config,
            authenticator: None,
            rules: None,
            resolver: None,
            dialer: None,
        }
    }

    /// Configured listen address
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Get a reference to the connection handler
    pub fn handler(&self) -> &SocksHandler {
        &self.handler
    }

    /// Bind the configured address and serve until shutdown
    pub async fn listen_and_serve(&self, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("Failed to listen on {}", self.listen_addr))?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve connections from an already bound listener until shutdown
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<()> {
        let local = listener
            .local_addr()
            .with_context(|| "Failed to get listener address")?;
        info!("SOCKS server listening on {}", local);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };

                    if let Err(e) = self.socket_opts.apply(&stream) {
                        warn!("Failed to apply socket options for {}: {}", peer, e);
                    }

                    let conn = ConnInfo {
                        remote_addr: Some(peer),
                        local_addr: stream.local_addr().ok(),
                    };
                    let handler = self.handler.clone();

                    tokio::spawn(async move {
                        debug!("Accepted connection from {}", peer);
                        if let Err(e) = handler.handle_connection(BufReader::new(stream), conn).await {
                            warn!("Connection from {} closed with error: {}", peer, e);
                        }
                    });
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Builder for [`Server`]
///
/// Collaborators that are not set are derived from the configuration.
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
    authenticator: Option<Authenticator>,
    rules: Option<Arc<dyn RuleEngine>>,
    resolver: Option<Arc<dyn Resolver>>,
    dialer: Option<Arc<dyn Dialer>>,
}

impl ServerBuilder {
    /// Use a custom authenticator
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Use a custom rule engine
    pub fn rules(mut self, rules: Arc<dyn RuleEngine>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Use a custom resolver
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a custom dialer
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Validate the configuration and build the server
    pub fn build(self) -> Result<Server> {
        let config = self.config;
        config
            .socks
            .validate()
            .map_err(|e| anyhow!(e))
            .with_context(|| "Invalid SOCKS configuration")?;

        let socket_opts = SocketOpts::from_tcp_config(&config.tcp);
        let dialer = self.dialer.unwrap_or_else(|| {
            Arc::new(
                DirectDialer::with_defaults()
                    .with_socket_opts(socket_opts.clone())
                    .with_connect_timeout(Duration::from_secs(config.socks.request_timeout)),
            )
        });

        let mut handler = SocksHandler::new(config.socks.clone()).with_dialer(dialer);
        if let Some(authenticator) = self.authenticator {
            handler = handler.with_authenticator(authenticator);
        }
        if let Some(rules) = self.rules {
            handler = handler.with_rules(rules);
        }
        if let Some(resolver) = self.resolver {
            handler = handler.with_resolver(resolver);
        }

        Ok(Server {
            listen_addr: config.listen_addr,
            socket_opts,
            handler: Arc::new(handler),
        })
    }
}
