use crate::addr::Mac;
use crate::physical::PhysicalRx;
use crate::wire::{Frame, Packet};
use crate::{RxError, RxResult};

/// Receive half of the link layer. Undecodable frames and frames whose
/// integrity tag does not verify are dropped here and never reach the
/// network layer.
///
/// The destination MAC is not filtered: the carrier only delivers frames
/// addressed to this endpoint, so whether the packet is wanted here is
/// decided by the network layer on top.
pub struct LinkRx {
    physical: PhysicalRx,
    local_mac: Mac,
}

impl LinkRx {
    pub fn new(physical: PhysicalRx, local_mac: Mac) -> LinkRx {
        LinkRx {
            physical,
            local_mac,
        }
    }

    /// Blocks until the physical layer delivers a frame and returns the
    /// packet inside it.
    pub fn recv(&mut self) -> RxResult<Packet> {
        let data = self.physical.recv().map_err(|_| RxError::Shutdown)?;
        let (frame, valid) = match Frame::decode(&data) {
            Some(decoded) => decoded,
            None => {
                warn!("? -> {}: frame dropped, undecodable", self.local_mac);
                return Err(RxError::InvalidFrame);
            }
        };
        if !valid {
            warn!(
                "{} -> {}: frame dropped, integrity check failed",
                frame.src_mac, self.local_mac
            );
            return Err(RxError::InvalidChecksum);
        }
        debug!(
            "{} -> {}: packet received (src_vip={} dst_vip={})",
            frame.src_mac, self.local_mac, frame.packet.src_vip, frame.packet.dst_vip
        );
        Ok(frame.packet)
    }
}
