//! BIND command
//!
//! The server listens on behalf of the client, reports the listening address,
//! waits for a single inbound connection and then relays it over the control
//! connection. Two replies are sent: one after listening, one after accept.

use crate::error::{ReplyStatus, SocksError};
use crate::socks::command::send_reply;
use crate::socks::tcp_relay::relay_tcp;
use crate::socks::types::{AddrSpec, Request};
use crate::transport::Dialer;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle BIND command
///
/// `local_ip` is the local address of the control connection, when known;
/// the listener is bound there so the reported address is reachable.
pub async fn handle_bind<S>(
    mut client_stream: S,
    request: &Request,
    local_ip: Option<IpAddr>,
    dialer: &dyn Dialer,
    accept_timeout: Duration,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = request.version;
    let bind_ip = local_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let listener = match dialer.listen_tcp(SocketAddr::new(bind_ip, 0)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("Failed to open BIND listener: {}", e);
            send_reply(&mut client_stream, version, ReplyStatus::ServerFailure, None).await?;
            return Err(SocksError::CommandExecution(format!(
                "failed to open BIND listener: {}",
                e
            )));
        }
    };

    let bound = AddrSpec::from(listener.local_addr()?);
    send_reply(&mut client_stream, version, ReplyStatus::Success, Some(&bound)).await?;
    debug!("BIND listening on {} for {}", bound, request.dest_addr);

    let (peer_stream, peer_addr) = match tokio::time::timeout(accept_timeout, listener.accept()).await
    {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(e)) => {
            warn!("BIND accept on {} failed: {}", bound, e);
            send_reply(&mut client_stream, version, ReplyStatus::ServerFailure, None).await?;
            return Err(e.into());
        }
        Err(_) => {
            warn!("BIND on {} timed out after {:?}", bound, accept_timeout);
            send_reply(&mut client_stream, version, ReplyStatus::TtlExpired, None).await?;
            return Err(SocksError::CommandExecution(format!(
                "no inbound connection on {} within {:?}",
                bound, accept_timeout
            )));
        }
    };
    drop(listener);

    if let Some(expected) = expected_peer(request) {
        if peer_addr.ip() != expected {
            warn!(
                "BIND peer {} does not match requested address {}",
                peer_addr, request.dest_addr
            );
            send_reply(&mut client_stream, version, ReplyStatus::RuleFailure, None).await?;
            return Err(SocksError::BlockedByRules(format!(
                "BIND peer {} is not {}",
                peer_addr, expected
            )));
        }
    }

    send_reply(
        &mut client_stream,
        version,
        ReplyStatus::Success,
        Some(&AddrSpec::from(peer_addr)),
    )
    .await?;

    info!("BIND connection from {} on {}", peer_addr, bound);

    relay_tcp(client_stream, peer_stream).await
}

/// IP the inbound connection must come from, if the request names one
fn expected_peer(request: &Request) -> Option<IpAddr> {
    request
        .dest_addr
        .socket_addr()
        .map(|addr| addr.ip())
        .filter(|ip| !ip.is_unspecified())
}
