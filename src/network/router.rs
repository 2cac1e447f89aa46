use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::addr::Vip;
use crate::link::{LinkRx, LinkTx};
use crate::routing::RoutingTable;
use crate::{RxError, RxResult};

#[derive(Default)]
struct Counters {
    forwarded: AtomicU64,
    dropped_ttl: AtomicU64,
    dropped_unknown: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RouterStats {
        RouterStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped_ttl: self.dropped_ttl.load(Ordering::Relaxed),
            dropped_unknown: self.dropped_unknown.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a router's forwarding counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub forwarded: u64,
    pub dropped_ttl: u64,
    pub dropped_unknown: u64,
}

impl RouterStats {
    pub fn total(&self) -> u64 {
        self.forwarded + self.dropped_ttl + self.dropped_unknown
    }
}

/// Cloneable read handle onto a router's counters, for watching them
/// while [`RouterRx::run`] owns the router on another thread.
#[derive(Clone)]
pub struct RouterStatsHandle {
    counters: Arc<Counters>,
}

impl RouterStatsHandle {
    pub fn snapshot(&self) -> RouterStats {
        self.counters.snapshot()
    }
}

/// Receive half of the network layer for routers. Each received packet
/// is forwarded as a side effect: TTL checked and decremented, next hop
/// looked up, packet re-emitted via the link. Nothing is ever delivered
/// to an upper layer; upper layers do not run on a router.
pub struct RouterRx {
    link_rx: LinkRx,
    link_tx: LinkTx,
    local_vip: Vip,
    routing_table: Arc<RoutingTable>,
    counters: Arc<Counters>,
}

impl RouterRx {
    pub fn new(
        link_rx: LinkRx,
        link_tx: LinkTx,
        local_vip: Vip,
        routing_table: Arc<RoutingTable>,
    ) -> RouterRx {
        RouterRx {
            link_rx,
            link_tx,
            local_vip,
            routing_table,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Blocks until the link delivers a packet and forwards it. `Ok`
    /// means one packet went out; every `Err` except `Shutdown` is a
    /// counted drop.
    pub fn forward(&mut self) -> RxResult<()> {
        let mut packet = self.link_rx.recv()?;
        if packet.ttl == 0 {
            warn!(
                "{} -> {}: packet dropped, TTL expired",
                packet.src_vip, packet.dst_vip
            );
            self.counters.dropped_ttl.fetch_add(1, Ordering::Relaxed);
            return Err(RxError::TtlExpired);
        }
        packet.ttl -= 1;
        let next_hop = match self.routing_table.route(&packet.dst_vip) {
            Some(hop) => hop.clone(),
            None => {
                error!("{} -> ?: no route to {}", packet.src_vip, packet.dst_vip);
                self.counters
                    .dropped_unknown
                    .fetch_add(1, Ordering::Relaxed);
                return Err(RxError::NoRoute(packet.dst_vip));
            }
        };
        debug!(
            "{} -> {}: packet forwarded (next_hop={} ttl={})",
            packet.src_vip, packet.dst_vip, next_hop, packet.ttl
        );
        self.link_tx
            .send(packet, &next_hop)
            .map_err(|e| RxError::Other(format!("forwarding failed: {}", e)))?;
        self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forwards packets until the carrier closes.
    pub fn run(&mut self) {
        loop {
            match self.forward() {
                Err(RxError::Shutdown) => break,
                _ => continue,
            }
        }
        debug!("{}: router loop stopped", self.local_vip);
    }

    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    pub fn stats_handle(&self) -> RouterStatsHandle {
        RouterStatsHandle {
            counters: self.counters.clone(),
        }
    }
}
