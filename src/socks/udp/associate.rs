//! UDP ASSOCIATE handler
//!
//! Implements the UDP ASSOCIATE command for SOCKS5.
//!
//! The association owns two sockets: one facing the client and one used to
//! reach destinations. It lives exactly as long as the TCP control connection
//! that requested it.

use super::packet::{encode_udp_packet, parse_udp_packet, UdpPacket};
use crate::error::{ReplyStatus, SocksError};
use crate::socks::command::send_reply;
use crate::socks::consts::MAX_UDP_PACKET;
use crate::socks::resolver::Resolver;
use crate::socks::types::{AddrSpec, Request};
use crate::transport::Dialer;
use bytes::Bytes;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle UDP ASSOCIATE command
///
/// # Protocol Flow
///
/// 1. Bind the client-facing and outbound UDP sockets
/// 2. Reply with the client-facing socket address as BND.ADDR:BND.PORT
/// 3. Relay datagrams in both directions
/// 4. When the TCP control connection closes, the association ends
///
/// `local_ip` is the local address of the control connection, when known.
pub async fn handle_associate<S>(
    mut control: S,
    request: &Request,
    local_ip: Option<IpAddr>,
    resolver: Arc<dyn Resolver>,
    dialer: Arc<dyn Dialer>,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let relay = match UdpAssociateRelay::bind(dialer.as_ref(), local_ip, request).await {
        Ok(relay) => relay,
        Err(e) => {
            warn!("Failed to set up UDP association: {}", e);
            send_reply(&mut control, request.version, ReplyStatus::ServerFailure, None).await?;
            return Err(SocksError::CommandExecution(format!(
                "failed to bind UDP relay: {}",
                e
            )));
        }
    };

    let bound = AddrSpec::from(relay.local_addr());
    send_reply(&mut control, request.version, ReplyStatus::Success, Some(&bound)).await?;

    info!("UDP ASSOCIATE established on {}", bound);

    relay.run(control, resolver).await?;

    info!("UDP ASSOCIATE session on {} ended", bound);
    Ok(())
}

/// A bound UDP association
#[derive(Debug)]
pub struct UdpAssociateRelay {
    local_addr: SocketAddr,
    client_socket: Arc<UdpSocket>,
    outbound_socket: Arc<UdpSocket>,
    /// Only datagrams from this IP are accepted, when set
    expected_client: Option<IpAddr>,
}

impl UdpAssociateRelay {
    /// Bind both sockets of an association
    ///
    /// The client-facing socket listens on `local_ip` (or the wildcard
    /// address) with an ephemeral port.
    pub async fn bind(
        dialer: &dyn Dialer,
        local_ip: Option<IpAddr>,
        request: &Request,
    ) -> io::Result<Self> {
        let bind_ip = local_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let client_socket = dialer.listen_udp(SocketAddr::new(bind_ip, 0)).await?;
        let local_addr = client_socket.local_addr()?;

        let outbound_ip = match bind_ip {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let outbound_socket = dialer.listen_udp(SocketAddr::new(outbound_ip, 0)).await?;

        let expected_client = request
            .dest_addr
            .socket_addr()
            .map(|addr| addr.ip())
            .filter(|ip| !ip.is_unspecified());

        Ok(UdpAssociateRelay {
            local_addr,
            client_socket: Arc::new(client_socket),
            outbound_socket: Arc::new(outbound_socket),
            expected_client,
        })
    }

    /// Address of the client-facing socket
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Relay datagrams until the control connection closes
    pub async fn run<S>(self, control: S, resolver: Arc<dyn Resolver>) -> Result<(), SocksError>
    where
        S: AsyncRead + Unpin,
    {
        let token = CancellationToken::new();
        let (client_tx, client_rx) = watch::channel(None);

        let inbound: JoinHandle<Result<(), SocksError>> = tokio::spawn(client_to_target(
            self.client_socket.clone(),
            self.outbound_socket.clone(),
            resolver,
            self.expected_client,
            client_tx,
            token.clone(),
        ));
        let outbound: JoinHandle<Result<(), SocksError>> = tokio::spawn(target_to_client(
            self.outbound_socket.clone(),
            self.client_socket.clone(),
            client_rx,
            token.clone(),
        ));

        monitor_control_stream(control).await;
        token.cancel();

        let mut result = Ok(());
        for (name, handle) in [("client->target", inbound), ("target->client", outbound)] {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("UDP relay {} failed: {}", name, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
                Err(e) => {
                    if result.is_ok() {
                        result = Err(SocksError::CommandExecution(format!(
                            "UDP relay {} task failed: {}",
                            name, e
                        )));
                    }
                }
            }
        }
        result
    }
}

/// Monitor the control stream for closure
///
/// The UDP association terminates when the TCP control connection closes.
/// Anything the client sends on it is discarded.
async fn monitor_control_stream<S>(mut stream: S)
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 512];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                debug!("Control stream closed, terminating UDP association");
                break;
            }
            Ok(n) => {
                debug!("Discarding {} bytes on UDP control stream", n);
            }
            Err(e) => {
                debug!("Control stream error: {}", e);
                break;
            }
        }
    }
}

/// Forward client datagrams to their destinations
async fn client_to_target(
    client_socket: Arc<UdpSocket>,
    outbound_socket: Arc<UdpSocket>,
    resolver: Arc<dyn Resolver>,
    expected_client: Option<IpAddr>,
    client_tx: watch::Sender<Option<SocketAddr>>,
    token: CancellationToken,
) -> Result<(), SocksError> {
    let mut buf = vec![0u8; MAX_UDP_PACKET];

    loop {
        let (len, src) = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            res = client_socket.recv_from(&mut buf) => res?,
        };

        if let Some(ip) = expected_client {
            if src.ip() != ip {
                debug!("Dropping UDP datagram from unexpected client {}", src);
                continue;
            }
        }

        let known = *client_tx.borrow();
        match known {
            None => {
                debug!("UDP association bound to client {}", src);
                client_tx.send_replace(Some(src));
            }
            Some(client) if client != src => {
                debug!("Dropping UDP datagram from {}, association belongs to {}", src, client);
                continue;
            }
            Some(_) => {}
        }

        let packet = match parse_udp_packet(&buf[..len]).await {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Invalid SOCKS5 UDP packet from {}: {}", src, e);
                continue;
            }
        };

        if packet.is_fragmented() {
            debug!("Dropping UDP fragment {} from {}", packet.frag, src);
            continue;
        }

        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = forward_to_target(&outbound_socket, resolver.as_ref(), &packet) => {}
        }
    }
}

/// Resolve the destination of one datagram and send its payload
async fn forward_to_target(
    outbound_socket: &UdpSocket,
    resolver: &dyn Resolver,
    packet: &UdpPacket,
) {
    let target = match packet.addr.socket_addr() {
        Some(addr) => addr,
        None => match resolver.resolve(&packet.addr.fqdn).await {
            Ok(ip) => SocketAddr::new(ip, packet.addr.port),
            Err(e) => {
                warn!("Failed to resolve UDP target {}: {}", packet.addr, e);
                return;
            }
        },
    };

    if let Err(e) = outbound_socket.send_to(&packet.data, target).await {
        warn!("UDP send to {} failed: {}", target, e);
        return;
    }

    debug!("UDP relay: sent {} bytes to {}", packet.data.len(), target);
}

/// Wrap destination replies and deliver them to the client
async fn target_to_client(
    outbound_socket: Arc<UdpSocket>,
    client_socket: Arc<UdpSocket>,
    client_rx: watch::Receiver<Option<SocketAddr>>,
    token: CancellationToken,
) -> Result<(), SocksError> {
    let mut buf = vec![0u8; MAX_UDP_PACKET];

    loop {
        let (len, from) = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            res = outbound_socket.recv_from(&mut buf) => res?,
        };

        let client = *client_rx.borrow();
        let Some(client) = client else {
            debug!("Dropping UDP reply from {} before any client datagram", from);
            continue;
        };

        let packet = UdpPacket::new(AddrSpec::from(from), Bytes::copy_from_slice(&buf[..len]));
        let datagram = match encode_udp_packet(&packet) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("Failed to encode UDP reply from {}: {}", from, e);
                continue;
            }
        };
        if let Err(e) = client_socket.send_to(&datagram, client).await {
            warn!("UDP send to client {} failed: {}", client, e);
            continue;
        }

        debug!("UDP relay: received {} bytes from {}", len, from);
    }
}
