//! Where the layers get zipped together. Nothing here adds behavior;
//! these helpers only wire carrier → physical → link → network →
//! transport the way every binary and test would otherwise do by hand.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::link::{LinkRx, LinkTx};
use crate::network::{HostRx, NetworkTx, RouterRx};
use crate::physical::{PhysicalRx, PhysicalTx};
use crate::topology::{self, HostConfig};
use crate::transport::{Config, ReliableTransport};
use crate::DatagramChannel;

/// Binds a UDP socket on `endpoint` and returns its two halves as a
/// carrier channel.
pub fn udp_channel(endpoint: SocketAddr) -> io::Result<DatagramChannel> {
    let socket = UdpSocket::bind(endpoint)?;
    let receiver = socket.try_clone()?;
    Ok(DatagramChannel(Arc::new(socket), Box::new(receiver)))
}

/// Wires the network layer of an end host over `channel`.
pub fn host_network(config: &HostConfig, channel: DatagramChannel) -> (NetworkTx, HostRx) {
    let DatagramChannel(sender, receiver) = channel;
    let physical_tx = PhysicalTx::new(sender, Arc::new(topology::mac_table()));
    let link_tx = LinkTx::new(physical_tx, config.mac, Arc::new(config.arp_table.clone()));
    let network_tx = NetworkTx::new(
        link_tx,
        config.vaddr.vip.clone(),
        Arc::new(config.routing_table.clone()),
    );

    let link_rx = LinkRx::new(PhysicalRx::new(receiver), config.mac);
    let host_rx = HostRx::new(link_rx, config.vaddr.vip.clone());
    (network_tx, host_rx)
}

/// Wires a complete host stack for `config` over `channel`.
pub fn host_stack(config: &HostConfig, channel: DatagramChannel) -> ReliableTransport {
    host_stack_with(config, channel, Config::default())
}

/// Like [`host_stack`] but with custom transport tunables.
pub fn host_stack_with(
    config: &HostConfig,
    channel: DatagramChannel,
    transport_config: Config,
) -> ReliableTransport {
    let (network_tx, host_rx) = host_network(config, channel);
    ReliableTransport::with_config(network_tx, host_rx, config.vaddr.clone(), transport_config)
}

/// Wires the router variant of the stack for `config` over `channel`.
pub fn router_stack(config: &HostConfig, channel: DatagramChannel) -> RouterRx {
    let DatagramChannel(sender, receiver) = channel;
    let physical_tx = PhysicalTx::new(sender, Arc::new(topology::mac_table()));
    let link_tx = LinkTx::new(physical_tx, config.mac, Arc::new(config.arp_table.clone()));
    let link_rx = LinkRx::new(PhysicalRx::new(receiver), config.mac);
    RouterRx::new(
        link_rx,
        link_tx,
        config.vaddr.vip.clone(),
        Arc::new(config.routing_table.clone()),
    )
}
