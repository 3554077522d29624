//! TCP relay for the CONNECT command
//!
//! Handles CONNECT requests by establishing a connection to the target
//! and relaying data bidirectionally.

use crate::error::{ReplyStatus, SocksError};
use crate::socks::command::send_reply;
use crate::socks::resolver::{resolve_addr, Resolver};
use crate::socks::types::{AddrSpec, Request};
use crate::transport::Dialer;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle CONNECT command
///
/// This function:
/// 1. Resolves the destination address
/// 2. Dials the destination
/// 3. Sends a success reply carrying the outbound socket's local address
/// 4. Relays data bidirectionally between client and target
///
/// Resolution and dial failures are answered with the matching reply status
/// and returned as errors without relaying.
pub async fn handle_connect<S>(
    mut client_stream: S,
    request: &Request,
    resolver: &dyn Resolver,
    dialer: &dyn Dialer,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let target = match resolve_addr(&request.dest_addr, resolver).await {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Failed to resolve {}: {}", request.dest_addr, e);
            send_reply(
                &mut client_stream,
                request.version,
                ReplyStatus::HostUnreachable,
                None,
            )
            .await?;
            return Err(e);
        }
    };

    debug!("Connecting to target: {}", target);

    let target_stream = match dialer.dial(target).await {
        Ok(stream) => stream,
        Err(e) => {
            let status = ReplyStatus::from(&e);
            warn!("Failed to connect to {}: {} ({:?})", target, e, status);
            send_reply(&mut client_stream, request.version, status, None).await?;
            return Err(SocksError::Connect {
                addr: request.dest_addr.address(),
                source: e,
            });
        }
    };

    let local_addr = AddrSpec::from(target_stream.local_addr()?);
    send_reply(
        &mut client_stream,
        request.version,
        ReplyStatus::Success,
        Some(&local_addr),
    )
    .await?;

    info!("{} CONNECT established to {}", request.version, target);

    relay_tcp(client_stream, target_stream).await
}

/// Relay data bidirectionally between two streams
///
/// Copies data in both directions concurrently and returns when either
/// direction finishes. EOF ends the relay cleanly; an I/O error in either
/// direction is returned to the caller.
pub async fn relay_tcp<A, B>(a: A, b: B) -> Result<(), SocksError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = tokio::io::copy(&mut a_read, &mut b_write);
    let b_to_a = tokio::io::copy(&mut b_read, &mut a_write);

    let (direction, result) = tokio::select! {
        result = a_to_b => ("client->target", result),
        result = b_to_a => ("target->client", result),
    };

    match result {
        Ok(bytes) => {
            debug!("{} finished: {} bytes", direction, bytes);
            Ok(())
        }
        Err(e) => {
            debug!("{} error: {}", direction, e);
            Err(SocksError::Transport(e))
        }
    }
}
