use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};

use super::ChannelReceiver;
use crate::{DatagramChannel, DatagramSender};

/// Deterministic faults for a [`Hub`]. Frames are counted per source
/// endpoint in send order, starting at 0; a frame may appear in more
/// than one set.
#[derive(Clone, Default)]
pub struct FaultPlan {
    drop: HashSet<(SocketAddr, u64)>,
    duplicate: HashSet<(SocketAddr, u64)>,
    corrupt: HashSet<(SocketAddr, u64)>,
}

impl FaultPlan {
    pub fn new() -> FaultPlan {
        FaultPlan::default()
    }

    /// Drops the `n`th frame sent from `src`.
    pub fn drop_nth_from(mut self, src: SocketAddr, n: u64) -> FaultPlan {
        self.drop.insert((src, n));
        self
    }

    /// Delivers the `n`th frame sent from `src` twice.
    pub fn duplicate_nth_from(mut self, src: SocketAddr, n: u64) -> FaultPlan {
        self.duplicate.insert((src, n));
        self
    }

    /// Flips a byte in the `n`th frame sent from `src`.
    pub fn corrupt_nth_from(mut self, src: SocketAddr, n: u64) -> FaultPlan {
        self.corrupt.insert((src, n));
        self
    }
}

struct HubState {
    endpoints: HashMap<SocketAddr, Sender<Vec<u8>>>,
    sent: HashMap<SocketAddr, u64>,
    faults: FaultPlan,
}

/// An in-memory carrier segment connecting any number of endpoints,
/// standing in for the noisy datagram medium. Frames sent from any
/// attached channel are delivered straight into the destination
/// endpoint's receive queue, after the fault plan has had its say.
/// Frames to unknown endpoints disappear, like any datagram would.
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    pub fn new() -> Hub {
        Hub::with_faults(FaultPlan::default())
    }

    pub fn with_faults(faults: FaultPlan) -> Hub {
        Hub {
            state: Arc::new(Mutex::new(HubState {
                endpoints: HashMap::new(),
                sent: HashMap::new(),
                faults,
            })),
        }
    }

    /// Attaches a new carrier channel to the hub at `endpoint`.
    pub fn attach(&self, endpoint: SocketAddr) -> DatagramChannel {
        let (inject_tx, inject_rx) = mpsc::channel();
        self.state
            .lock()
            .unwrap()
            .endpoints
            .insert(endpoint, inject_tx);
        DatagramChannel(
            Arc::new(HubSender {
                state: self.state.clone(),
                from: endpoint,
            }),
            Box::new(ChannelReceiver { chan: inject_rx }),
        )
    }
}

impl Default for Hub {
    fn default() -> Hub {
        Hub::new()
    }
}

struct HubSender {
    state: Arc<Mutex<HubState>>,
    from: SocketAddr,
}

impl DatagramSender for HubSender {
    fn send_to(&self, frame: &[u8], dst: SocketAddr) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let n = {
            let counter = state.sent.entry(self.from).or_insert(0);
            let n = *counter;
            *counter += 1;
            n
        };
        if state.faults.drop.contains(&(self.from, n)) {
            debug!("hub: dropping frame {} from {}", n, self.from);
            return Ok(());
        }
        let mut payload = frame.to_vec();
        if state.faults.corrupt.contains(&(self.from, n)) {
            debug!("hub: corrupting frame {} from {}", n, self.from);
            let mid = payload.len() / 2;
            if let Some(byte) = payload.get_mut(mid) {
                *byte ^= 0xFF;
            }
        }
        let copies = if state.faults.duplicate.contains(&(self.from, n)) {
            2
        } else {
            1
        };
        if let Some(tx) = state.endpoints.get(&dst) {
            for _ in 0..copies {
                // A receiver that went away looks exactly like loss.
                let _ = tx.send(payload.clone());
            }
        }
        Ok(())
    }
}
