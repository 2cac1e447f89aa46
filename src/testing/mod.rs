//! In-memory carriers for tests: a detached [`channel`] with inject and
//! read handles for driving a single stack, and a [`Hub`] that connects
//! several endpoints and plays the role of the noisy medium with
//! deterministic fault injection.

use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::{DatagramChannel, DatagramReceiver, DatagramSender};

mod hub;

pub use self::hub::{FaultPlan, Hub};

/// Creates a detached in-memory carrier. Frames the stack sends come out
/// of the read handle together with their destination endpoint; frames
/// pushed into the inject handle appear on the receive half. Dropping
/// the inject handle closes the carrier.
pub fn channel() -> (
    DatagramChannel,
    Sender<Vec<u8>>,
    Receiver<(Vec<u8>, SocketAddr)>,
) {
    let (inject_tx, inject_rx) = mpsc::channel();
    let (read_tx, read_rx) = mpsc::channel();
    let channel = DatagramChannel(
        Arc::new(ChannelSender {
            chan: Mutex::new(read_tx),
        }),
        Box::new(ChannelReceiver { chan: inject_rx }),
    );
    (channel, inject_tx, read_rx)
}

struct ChannelSender {
    chan: Mutex<Sender<(Vec<u8>, SocketAddr)>>,
}

impl DatagramSender for ChannelSender {
    fn send_to(&self, frame: &[u8], dst: SocketAddr) -> io::Result<()> {
        self.chan
            .lock()
            .unwrap()
            .send((frame.to_vec(), dst))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "carrier closed"))
    }
}

struct ChannelReceiver {
    chan: Receiver<Vec<u8>>,
}

impl DatagramReceiver for ChannelReceiver {
    fn recv(&mut self) -> io::Result<Vec<u8>> {
        self.chan
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "carrier closed"))
    }
}
