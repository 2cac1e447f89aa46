use std::collections::HashMap;

use crate::addr::Vip;

/// Static routing table: destination VIP to next-hop VIP. End hosts
/// usually carry nothing but a default route pointing at the router; the
/// router carries one direct entry per known host.
#[derive(Clone, Default)]
pub struct RoutingTable {
    table: HashMap<Vip, Vip>,
    default_route: Option<Vip>,
}

impl RoutingTable {
    pub fn new() -> RoutingTable {
        RoutingTable {
            table: HashMap::new(),
            default_route: None,
        }
    }

    pub fn add_route(&mut self, dst: Vip, next_hop: Vip) {
        self.table.insert(dst, next_hop);
    }

    /// Sets the gateway used for every destination without a direct entry.
    pub fn set_default_route(&mut self, gw: Vip) {
        self.default_route = Some(gw);
    }

    pub fn route(&self, dst: &Vip) -> Option<&Vip> {
        self.table.get(dst).or(self.default_route.as_ref())
    }
}
