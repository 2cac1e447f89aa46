use std::sync::Arc;

use super::DEFAULT_TTL;
use crate::addr::Vip;
use crate::link::LinkTx;
use crate::routing::RoutingTable;
use crate::wire::{Packet, Segment};
use crate::{TxError, TxResult};

/// Transmit half of the network layer, used unchanged by end hosts and
/// by routers originating their own packets.
#[derive(Clone)]
pub struct NetworkTx {
    link: LinkTx,
    local_vip: Vip,
    routing_table: Arc<RoutingTable>,
}

impl NetworkTx {
    pub fn new(link: LinkTx, local_vip: Vip, routing_table: Arc<RoutingTable>) -> NetworkTx {
        NetworkTx {
            link,
            local_vip,
            routing_table,
        }
    }

    pub fn local_vip(&self) -> &Vip {
        &self.local_vip
    }

    /// Wraps `segment` in a packet with a fresh TTL and sends it toward
    /// `dst` via the routing table's next hop. A missing route is fatal
    /// for the call.
    pub fn send(&self, segment: Segment, dst: &Vip) -> TxResult {
        let next_hop = match self.routing_table.route(dst) {
            Some(hop) => hop.clone(),
            None => {
                error!("{} -> ?: no route to {}", self.local_vip, dst);
                return Err(TxError::NoRoute(dst.clone()));
            }
        };
        let packet = Packet::new(self.local_vip.clone(), dst.clone(), DEFAULT_TTL, segment);
        debug!(
            "{} -> {}: packet sent (next_hop={} ttl={})",
            self.local_vip, dst, next_hop, packet.ttl
        );
        self.link.send(packet, &next_hop)
    }
}
