//! UDP ASSOCIATE support
//!
//! Datagram encapsulation and the per-association relay.

mod associate;
mod packet;

pub use associate::{handle_associate, UdpAssociateRelay};
pub use packet::{encode_udp_packet, parse_udp_packet, UdpPacket};
