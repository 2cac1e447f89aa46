use std::sync::Arc;

use super::MTU;
use crate::mactable::MacTable;
use crate::{wire, DatagramSender, TxError, TxResult};

/// Transmit half of the physical layer. Reads the destination MAC out of
/// the frame header, resolves it to a carrier endpoint through the static
/// MAC table and hands the bytes to the carrier.
#[derive(Clone)]
pub struct PhysicalTx {
    sender: Arc<dyn DatagramSender>,
    mac_table: Arc<MacTable>,
}

impl PhysicalTx {
    pub fn new(sender: Arc<dyn DatagramSender>, mac_table: Arc<MacTable>) -> PhysicalTx {
        PhysicalTx { sender, mac_table }
    }

    /// Transmits one encoded frame. Frames that do not fit in a datagram
    /// are rejected; frames whose destination MAC is unreadable or
    /// unknown are dropped with a logged error, not an error return.
    pub fn send(&self, frame: &[u8]) -> TxResult {
        if frame.len() > MTU {
            return Err(TxError::TooLargePayload);
        }
        let (src_mac, dst_mac) = match wire::peek_header(frame) {
            Some(header) => header,
            None => {
                error!("Outgoing frame has no readable header, dropping");
                return Ok(());
            }
        };
        let endpoint = match self.mac_table.query(&dst_mac) {
            Some(endpoint) => endpoint,
            None => {
                error!("MAC {} not in the MAC table, dropping frame", dst_mac);
                return Ok(());
            }
        };
        debug!(
            "{} -> {}: frame sent to {} ({} bytes)",
            src_mac,
            dst_mac,
            endpoint,
            frame.len()
        );
        self.sender.send_to(frame, endpoint).map_err(TxError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use super::*;
    use crate::addr::{Mac, VAddr, Vip};
    use crate::testing;
    use crate::wire::{Frame, Packet, Segment};

    fn frame_to(dst_mac: Mac) -> Vec<u8> {
        let segment = Segment::Ack {
            seq: 0,
            src: VAddr::new(Vip::from("HOST_A"), 10000),
            dst_port: 10002,
        };
        let packet = Packet::new(Vip::from("HOST_A"), Vip::from("HOST_S"), 64, segment);
        Frame::new(Mac::new(1, 1, 1, 1, 1, 1), dst_mac, packet).encode()
    }

    #[test]
    fn resolves_and_sends() {
        let dst_mac = Mac::new(2, 2, 2, 2, 2, 2);
        let endpoint: SocketAddr = "10.0.0.2:10001".parse().unwrap();
        let table: MacTable = [(dst_mac, endpoint)].into_iter().collect();
        let (channel, _inject, read) = testing::channel();
        let physical = PhysicalTx::new(channel.0, Arc::new(table));

        let frame = frame_to(dst_mac);
        physical.send(&frame).unwrap();

        let (sent, to) = read.try_recv().unwrap();
        assert_eq!(sent, frame);
        assert_eq!(to, endpoint);
    }

    #[test]
    fn unknown_mac_dropped() {
        let (channel, _inject, read) = testing::channel();
        let physical = PhysicalTx::new(channel.0, Arc::new(MacTable::new()));

        physical.send(&frame_to(Mac::new(9, 9, 9, 9, 9, 9))).unwrap();
        assert!(read.try_recv().is_err());
    }

    #[test]
    fn oversized_frame_rejected() {
        let (channel, _inject, read) = testing::channel();
        let physical = PhysicalTx::new(channel.0, Arc::new(MacTable::new()));

        let huge = vec![0; MTU + 1];
        assert!(matches!(physical.send(&huge), Err(TxError::TooLargePayload)));
        assert!(read.try_recv().is_err());
    }
}
