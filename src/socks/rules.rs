//! Access-control rules
//!
//! A [`RuleEngine`] decides whether a parsed request may run. Denial is
//! answered with a `ruleFailure` reply by the handler.

use super::types::{Command, Request};
use std::fmt::Debug;

/// Allow/deny policy over parsed requests
pub trait RuleEngine: Send + Sync + Debug {
    /// Whether the request may be executed
    fn allow(&self, request: &Request) -> bool;
}

/// Allows every request
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl RuleEngine for PermitAll {
    fn allow(&self, _request: &Request) -> bool {
        true
    }
}

/// Denies every request
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitNone;

impl RuleEngine for PermitNone {
    fn allow(&self, _request: &Request) -> bool {
        false
    }
}

/// Allows requests by command
#[derive(Debug, Clone, Copy)]
pub struct PermitCommand {
    /// Allow CONNECT
    pub enable_connect: bool,
    /// Allow BIND
    pub enable_bind: bool,
    /// Allow UDP ASSOCIATE
    pub enable_associate: bool,
}

impl RuleEngine for PermitCommand {
    fn allow(&self, request: &Request) -> bool {
        match request.command {
            Command::Connect => self.enable_connect,
            Command::Bind => self.enable_bind,
            Command::Associate => self.enable_associate,
        }
    }
}
