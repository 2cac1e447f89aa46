use std::sync::Arc;

use crate::addr::{Mac, Vip};
use crate::arptable::ArpTable;
use crate::physical::PhysicalTx;
use crate::wire::{Frame, Packet};
use crate::{TxError, TxResult};

/// Transmit half of the link layer.
#[derive(Clone)]
pub struct LinkTx {
    physical: PhysicalTx,
    local_mac: Mac,
    arp_table: Arc<ArpTable>,
}

impl LinkTx {
    pub fn new(physical: PhysicalTx, local_mac: Mac, arp_table: Arc<ArpTable>) -> LinkTx {
        LinkTx {
            physical,
            local_mac,
            arp_table,
        }
    }

    /// Resolves `next_hop` through the Arp table, frames `packet` with
    /// the integrity tag and hands it to the physical layer. An Arp miss
    /// is fatal for the call: with a static table there is no fallback.
    pub fn send(&self, packet: Packet, next_hop: &Vip) -> TxResult {
        let dst_mac = match self.arp_table.query(next_hop) {
            Some(mac) => *mac,
            None => {
                error!(
                    "{} -> ?: Arp failed, no entry for {}",
                    self.local_mac, next_hop
                );
                return Err(TxError::Arp(next_hop.clone()));
            }
        };
        debug!(
            "{} -> {}: frame sent (next_hop={} src_vip={})",
            self.local_mac, dst_mac, next_hop, packet.src_vip
        );
        let frame = Frame::new(self.local_mac, dst_mac, packet);
        self.physical.send(&frame.encode())
    }
}
