//! # Socksd - SOCKS4/4a/5 Proxy Server
//!
//! Socksd accepts SOCKS control connections, negotiates authentication,
//! parses the client's request, checks it against an access policy and
//! executes CONNECT, BIND or UDP ASSOCIATE.
//!
//! ## Features
//!
//! - **Three protocol versions**: SOCKS4, SOCKS4a (remote hostname) and SOCKS5
//! - **Username/password authentication** (RFC 1929) for SOCKS5 clients
//! - **Pluggable collaborators**: rule engine, resolver and outbound dialer are traits
//! - **Full UDP ASSOCIATE support**: the relay lives exactly as long as its control connection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksd::config::load_config;
//! use socksd::Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("socksd.toml")?;
//!     let server = Server::builder(config.server).build()?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     server.listen_and_serve(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! accept -> version -> auth (SOCKS5) -> request -> rules -> CONNECT | BIND | ASSOCIATE
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ReplyStatus, SocksError};
pub use server::{Server, ServerBuilder};

/// Version of the Socksd library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
