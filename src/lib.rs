//! # Vips - Virtual IP Stack
//!
//! `vips` is a small layered network stack meant for studying how real
//! stacks are put together. It speaks a frame/packet/segment protocol
//! suite of its own over plain UDP datagrams, so an entire multi-host
//! topology can run as a handful of processes on one machine. Addressing
//! above the carrier is virtual: hosts are identified by symbolic virtual
//! IPs (VIPs) and reached through a single router.
//!
//! The canonical topology has four participants, wired up by the
//! [`topology`] module: two clients and a relay server that only see the
//! router as their next hop, and the router which sees everyone.
//!
//! ## Layering
//!
//! Each layer depends only on the one directly below it.
//!
//! - **Physical** ([`physical`]): sends and receives opaque frame bytes
//!   over a datagram carrier, resolving destination MAC to a carrier
//!   endpoint through a static [`MacTable`]. The carrier may drop,
//!   duplicate or corrupt frames.
//! - **Link** ([`link`]): wraps packets in frames carrying source and
//!   destination MAC plus a CRC-32 integrity tag; resolves next-hop MACs
//!   through a static [`ArpTable`]. Frames failing integrity are dropped
//!   here, silently.
//! - **Network** ([`network`]): two receive variants over one send path.
//!   Hosts deliver packets addressed to their own VIP and drop the rest;
//!   routers decrement TTL and forward, and never deliver upwards.
//! - **Transport** ([`transport`]): a Stop-and-Wait reliable byte-stream
//!   multiplexer. One background dispatch loop per host demultiplexes
//!   inbound segments to per-connection mailboxes; connections chunk data
//!   at MSS, retransmit on timeout and tear down with a retried FIN/ACK
//!   exchange.
//!
//! ## Architecture and terminology
//!
//! Like the larger stacks this one imitates, every layer is split into a
//! *tx-object* and an *rx-object*. Tx-objects (`PhysicalTx`, `LinkTx`,
//! `NetworkTx`) build their layer's header around a payload and hand it
//! down; they are cheap to clone and every connection owns its own chain
//! down to the shared carrier. Rx-objects (`PhysicalRx`, `LinkRx`,
//! `HostRx`, `RouterRx`) parse and classify inbound traffic and have a
//! single owner: the one thread that reads them, which for a host is the
//! transport's dispatch loop.
//!
//! The carrier itself is abstracted behind [`DatagramSender`] and
//! [`DatagramReceiver`] so the same stack runs over a bound `UdpSocket`
//! (see [`stack::udp_channel`]) or over the in-memory channels in
//! [`testing`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vips::{stack, topology};
//!
//! let config = topology::client_a();
//! let channel = stack::udp_channel(config.endpoint).unwrap();
//! let transport = stack::host_stack(&config, channel);
//!
//! let mut connection = transport.connect(topology::server().vaddr);
//! connection.send(b"hello").unwrap();
//! let reply = connection.receive();
//! ```
//!
//! ## Tests
//!
//! Unit tests live next to the code they cover. The integration tests
//! under `tests/` drive whole stacks over [`testing::Hub`], an in-memory
//! carrier that routes frames between endpoints and can drop, duplicate
//! or corrupt selected frames deterministically.

#[macro_use]
extern crate log;

use std::error::Error;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::addr::Vip;

pub mod addr;
pub mod wire;

mod mactable;
pub use crate::mactable::MacTable;

mod arptable;
pub use crate::arptable::ArpTable;

mod routing;
pub use crate::routing::RoutingTable;

pub mod physical;
pub mod link;
pub mod network;
pub mod transport;

pub mod topology;
pub mod stack;

/// In-memory carriers and fault injection for tests. Public so the
/// integration suite (and downstream experiments) can build stacks
/// without binding sockets.
pub mod testing;

/// Sending half of a datagram carrier. Every call transmits one whole
/// frame as a single datagram; implementations must be callable from
/// multiple threads at once.
pub trait DatagramSender: Send + Sync {
    fn send_to(&self, frame: &[u8], dst: SocketAddr) -> io::Result<()>;
}

/// Receiving half of a datagram carrier.
pub trait DatagramReceiver: Send {
    /// Blocks until the next datagram arrives and returns its bytes.
    /// Transient failures are reported as an empty datagram, which the
    /// layers above treat as a dropped frame. `Err` means the carrier is
    /// permanently gone and receive loops should terminate.
    fn recv(&mut self) -> io::Result<Vec<u8>>;
}

/// The two halves of one host's datagram carrier. The sending half is
/// shared by every tx-object on the host, the receiving half has exactly
/// one reader.
pub struct DatagramChannel(pub Arc<dyn DatagramSender>, pub Box<dyn DatagramReceiver>);

/// Enum representing errors happening while trying to send through the
/// stack. Only configuration-level failures surface here; losses on the
/// wire are absorbed by retransmission at the transport layer.
#[derive(Debug)]
pub enum TxError {
    /// The destination VIP has no entry in the local Arp table. The
    /// topology is static, so this is a configuration bug and fatal for
    /// the send call.
    Arp(Vip),

    /// The destination VIP has no entry in the local routing table.
    NoRoute(Vip),

    /// The frame does not fit in a single datagram (`physical::MTU`).
    TooLargePayload,

    /// Returned when there was an `io::Error` during transmission.
    Io(io::Error),
}

impl From<io::Error> for TxError {
    fn from(e: io::Error) -> Self {
        TxError::Io(e)
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TxError::Arp(ref vip) => write!(fmt, "Arp resolution failed for {}", vip),
            TxError::NoRoute(ref vip) => write!(fmt, "No route to {}", vip),
            TxError::TooLargePayload => fmt.write_str("Frame too large for one datagram"),
            TxError::Io(ref e) => write!(fmt, "IO error: {}", e),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let TxError::Io(ref e) = *self {
            Some(e)
        } else {
            None
        }
    }
}

/// Type binding for the type of `Result` that a send method returns.
pub type TxResult = Result<(), TxError>;

/// Error returned by the `recv` method of `*Rx` objects when the incoming
/// frame was dropped instead of delivered. Receive loops treat every
/// variant except `Shutdown` as "drop and read the next frame".
#[derive(Debug, Eq, PartialEq)]
pub enum RxError {
    /// The carrier is permanently gone. The only variant that terminates
    /// a receive loop.
    Shutdown,

    /// The frame bytes did not decode. Also covers the empty datagram a
    /// carrier reports on transient read errors.
    InvalidFrame,

    /// The frame's integrity tag did not match its content.
    InvalidChecksum,

    /// A packet addressed to some other host arrived here.
    WrongDestination { src: Vip, dst: Vip },

    /// A packet arrived at a router with no hops left.
    TtlExpired,

    /// A router had no route for the packet's destination.
    NoRoute(Vip),

    /// Some error that was not covered by the more specific errors in
    /// this enum.
    Other(String),
}

impl fmt::Display for RxError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RxError::Shutdown => fmt.write_str("Carrier closed"),
            RxError::InvalidFrame => fmt.write_str("Undecodable frame"),
            RxError::InvalidChecksum => fmt.write_str("Invalid integrity tag in frame"),
            RxError::WrongDestination { ref src, ref dst } => {
                write!(fmt, "Packet from {} addressed to {}", src, dst)
            }
            RxError::TtlExpired => fmt.write_str("TTL expired"),
            RxError::NoRoute(ref vip) => write!(fmt, "No route to {}", vip),
            RxError::Other(ref s) => write!(fmt, "Other error: {}", s),
        }
    }
}

impl Error for RxError {}

/// Simple type definition for the return type of `recv` on `*Rx` objects.
pub type RxResult<T> = Result<T, RxError>;
