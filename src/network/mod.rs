//! The network layer: virtual-IP addressed packets with TTL. One shared
//! send path and two receive variants: end hosts deliver packets
//! addressed to themselves and drop the rest, routers forward and never
//! deliver upwards.

mod host_rx;
mod network_tx;
mod router;

pub use self::host_rx::HostRx;
pub use self::network_tx::NetworkTx;
pub use self::router::{RouterRx, RouterStats, RouterStatsHandle};

/// TTL stamped on every packet at its origin.
pub const DEFAULT_TTL: u8 = 64;
