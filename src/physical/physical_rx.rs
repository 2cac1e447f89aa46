use std::io;

use crate::DatagramReceiver;

/// Receive half of the physical layer. Owned by the single thread that
/// reads this host's carrier.
pub struct PhysicalRx {
    receiver: Box<dyn DatagramReceiver>,
}

impl PhysicalRx {
    pub fn new(receiver: Box<dyn DatagramReceiver>) -> PhysicalRx {
        PhysicalRx { receiver }
    }

    /// Blocks until the carrier delivers a datagram and returns its raw
    /// bytes. An empty return is a dropped frame; `Err` means the carrier
    /// is gone for good.
    pub fn recv(&mut self) -> io::Result<Vec<u8>> {
        let data = self.receiver.recv()?;
        debug!("Frame received ({} bytes)", data.len());
        Ok(data)
    }
}
