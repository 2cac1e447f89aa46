//! The canonical four-host topology: two clients and a relay server
//! that reach each other through a single router. All addressing here is
//! static; this module is the one place the numbers live.
//!
//! Clients and the server only know the router as their next hop, both
//! in their Arp tables and as their default route. The router knows
//! every end host directly.

use std::net::SocketAddr;

use crate::addr::{Mac, VAddr, Vip};
use crate::arptable::ArpTable;
use crate::mactable::MacTable;
use crate::routing::RoutingTable;

pub const CLIENT_A_MAC: Mac = Mac::new(0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA);
pub const CLIENT_B_MAC: Mac = Mac::new(0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB);
pub const SERVER_MAC: Mac = Mac::new(0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC);
pub const ROUTER_MAC: Mac = Mac::new(0xDD, 0xDD, 0xDD, 0xDD, 0xDD, 0xDD);

pub const CLIENT_A_VIP: &str = "HOST_A";
pub const CLIENT_B_VIP: &str = "HOST_B";
pub const SERVER_VIP: &str = "HOST_S";
pub const ROUTER_VIP: &str = "HOST_R";

/// Everything needed to stand up one participant's stack.
pub struct HostConfig {
    pub name: &'static str,
    pub mac: Mac,
    /// The carrier endpoint this host binds.
    pub endpoint: SocketAddr,
    pub vaddr: VAddr,
    pub arp_table: ArpTable,
    pub routing_table: RoutingTable,
}

pub fn client_a() -> HostConfig {
    HostConfig {
        name: "alice",
        mac: CLIENT_A_MAC,
        endpoint: endpoint(1, 10000),
        vaddr: VAddr::new(Vip::from(CLIENT_A_VIP), 10000),
        arp_table: host_arp_table(),
        routing_table: host_routing_table(),
    }
}

pub fn client_b() -> HostConfig {
    HostConfig {
        name: "bob",
        mac: CLIENT_B_MAC,
        endpoint: endpoint(2, 10001),
        vaddr: VAddr::new(Vip::from(CLIENT_B_VIP), 10001),
        arp_table: host_arp_table(),
        routing_table: host_routing_table(),
    }
}

pub fn server() -> HostConfig {
    HostConfig {
        name: "server",
        mac: SERVER_MAC,
        endpoint: endpoint(3, 10002),
        vaddr: VAddr::new(Vip::from(SERVER_VIP), 10002),
        arp_table: host_arp_table(),
        routing_table: host_routing_table(),
    }
}

pub fn router() -> HostConfig {
    let arp_table = [
        (Vip::from(CLIENT_A_VIP), CLIENT_A_MAC),
        (Vip::from(CLIENT_B_VIP), CLIENT_B_MAC),
        (Vip::from(SERVER_VIP), SERVER_MAC),
    ]
    .into_iter()
    .collect();

    let mut routing_table = RoutingTable::new();
    for vip in [CLIENT_A_VIP, CLIENT_B_VIP, SERVER_VIP] {
        routing_table.add_route(Vip::from(vip), Vip::from(vip));
    }

    HostConfig {
        name: "router",
        mac: ROUTER_MAC,
        endpoint: endpoint(4, 10003),
        vaddr: VAddr::new(Vip::from(ROUTER_VIP), 10003),
        arp_table,
        routing_table,
    }
}

/// Looks a host up by its name.
pub fn host(name: &str) -> Option<HostConfig> {
    match name {
        "alice" => Some(client_a()),
        "bob" => Some(client_b()),
        "server" => Some(server()),
        "router" => Some(router()),
        _ => None,
    }
}

/// The carrier-wide MAC table, shared by every participant.
pub fn mac_table() -> MacTable {
    [
        (CLIENT_A_MAC, client_a().endpoint),
        (CLIENT_B_MAC, client_b().endpoint),
        (SERVER_MAC, server().endpoint),
        (ROUTER_MAC, router().endpoint),
    ]
    .into_iter()
    .collect()
}

fn endpoint(host: u8, port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, host], port))
}

fn host_arp_table() -> ArpTable {
    [(Vip::from(ROUTER_VIP), ROUTER_MAC)].into_iter().collect()
}

fn host_routing_table() -> RoutingTable {
    let mut table = RoutingTable::new();
    table.set_default_route(Vip::from(ROUTER_VIP));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_table_covers_everyone() {
        let table = mac_table();
        for config in [client_a(), client_b(), server(), router()] {
            assert_eq!(table.query(&config.mac), Some(config.endpoint));
        }
    }

    #[test]
    fn hosts_route_everything_through_the_router() {
        let config = client_a();
        assert_eq!(
            config.routing_table.route(&Vip::from(CLIENT_B_VIP)),
            Some(&Vip::from(ROUTER_VIP))
        );
        assert_eq!(
            config.arp_table.query(&Vip::from(ROUTER_VIP)),
            Some(&ROUTER_MAC)
        );
        assert!(config.arp_table.query(&Vip::from(CLIENT_B_VIP)).is_none());
    }

    #[test]
    fn router_reaches_end_hosts_directly() {
        let config = router();
        assert_eq!(
            config.routing_table.route(&Vip::from(SERVER_VIP)),
            Some(&Vip::from(SERVER_VIP))
        );
        assert_eq!(
            config.arp_table.query(&Vip::from(SERVER_VIP)),
            Some(&SERVER_MAC)
        );
        assert!(config.routing_table.route(&Vip::from("HOST_X")).is_none());
    }

    #[test]
    fn host_lookup() {
        assert_eq!(host("alice").unwrap().name, "alice");
        assert!(host("mallory").is_none());
    }
}
