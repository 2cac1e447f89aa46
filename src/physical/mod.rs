//! The physical layer: opaque frame bytes over a lossy datagram carrier.
//! The carrier delivers whole frames or nothing; it may also drop,
//! duplicate or corrupt them, which is entirely the business of the
//! layers above.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::{DatagramReceiver, DatagramSender};

mod physical_rx;
mod physical_tx;

pub use self::physical_rx::PhysicalRx;
pub use self::physical_tx::PhysicalTx;

/// Largest frame that fits in one datagram on the carrier.
pub const MTU: usize = 65507;

impl DatagramSender for UdpSocket {
    fn send_to(&self, frame: &[u8], dst: SocketAddr) -> io::Result<()> {
        UdpSocket::send_to(self, frame, dst).map(|_| ())
    }
}

impl DatagramReceiver for UdpSocket {
    fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; MTU];
        match self.recv_from(&mut buffer) {
            Ok((len, _)) => {
                buffer.truncate(len);
                Ok(buffer)
            }
            Err(e) => {
                error!("Error receiving from carrier: {}", e);
                Ok(Vec::new())
            }
        }
    }
}
