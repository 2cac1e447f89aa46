use crate::addr::Vip;
use crate::link::LinkRx;
use crate::wire::Segment;
use crate::{RxError, RxResult};

/// Receive half of the network layer for end hosts. Delivers segments
/// from packets addressed to the local VIP; anything else is dropped.
///
/// No TTL check happens here: a packet that made it to its destination
/// is delivered with whatever TTL it has left.
pub struct HostRx {
    link: LinkRx,
    local_vip: Vip,
}

impl HostRx {
    pub fn new(link: LinkRx, local_vip: Vip) -> HostRx {
        HostRx { link, local_vip }
    }

    /// Blocks until the link delivers a packet and returns the segment
    /// inside it.
    pub fn recv(&mut self) -> RxResult<Segment> {
        let packet = self.link.recv()?;
        if packet.dst_vip != self.local_vip {
            warn!(
                "{} -> {}: packet dropped, not addressed to {}",
                packet.src_vip, packet.dst_vip, self.local_vip
            );
            return Err(RxError::WrongDestination {
                src: packet.src_vip,
                dst: packet.dst_vip,
            });
        }
        debug!(
            "{} -> {}: segment delivered (ttl={})",
            packet.src_vip, self.local_vip, packet.ttl
        );
        Ok(packet.segment)
    }
}
