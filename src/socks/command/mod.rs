//! SOCKS command module
//!
//! Handles parsing requests and building replies.

mod parser;
mod reply;

pub use parser::new_request;
pub use reply::{build_reply, send_reply};
