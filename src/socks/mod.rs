//! SOCKS protocol engine
//!
//! This module implements the SOCKS4, SOCKS4a and SOCKS5 request/reply
//! protocols and the CONNECT, BIND and UDP ASSOCIATE commands. Streams are
//! generic, so the engine runs equally on accepted TCP sockets and in-memory
//! pipes.

pub mod address;
pub mod auth;
pub mod bind;
pub mod command;
pub mod consts;
pub mod handler;
pub mod resolver;
pub mod rules;
pub mod tcp_relay;
pub mod types;
pub mod udp;

pub use auth::{AuthContext, AuthMethod, Authenticator, CredentialStore, StaticCredentials};
pub use command::{new_request, send_reply};
pub use handler::{ConnInfo, SocksHandler};
pub use resolver::{DnsResolver, Resolver};
pub use rules::{PermitAll, PermitCommand, PermitNone, RuleEngine};
pub use tcp_relay::relay_tcp;
pub use types::{AddrSpec, Command, Request, SocksVersion};
