//! The transport layer: a Stop-and-Wait reliable connection multiplexer.
//!
//! One `ReliableTransport` per host owns the connection table and a
//! background dispatch loop that reads the network layer and routes every
//! inbound segment to the mailboxes of the connection it belongs to,
//! keyed by `(remote_vip, remote_port, local_port)`. Segments with no
//! owning connection are handled right in the loop: stale ACKs are
//! dropped, FINs are re-ACKed (their connection already finished closing
//! and removed itself), and data opens a fresh inbound connection that
//! [`ReliableTransport::accept`] hands to the application.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::addr::{VAddr, Vip};
use crate::network::{HostRx, NetworkTx};
use crate::wire::Segment;
use crate::RxError;

mod connection;

pub use self::connection::{ConnectionState, ReliableConnection};

use self::connection::Mailboxes;

/// Tunables for the reliable transport, kept in one record so tests can
/// run with much shorter timers than the defaults.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// How long a sender waits for an ACK before retransmitting.
    pub timeout: Duration,
    /// Largest data payload per segment, in bytes.
    pub mss: usize,
    /// FIN retransmissions before the connection is declared closed
    /// locally regardless.
    pub max_fin_retries: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            timeout: Duration::from_secs(2),
            mss: 1024,
            max_fin_retries: 8,
        }
    }
}

/// What a connection is looked up by: remote VIP, remote port, local
/// port. At most one connection exists per key at any moment.
pub type ConnectionKey = (Vip, u16, u16);

pub(crate) type ConnectionTable = Mutex<HashMap<ConnectionKey, Arc<Mailboxes>>>;

/// The reliable transport multiplexer for one local endpoint.
pub struct ReliableTransport {
    network: NetworkTx,
    local: VAddr,
    connections: Arc<ConnectionTable>,
    accept_rx: Receiver<ReliableConnection>,
    config: Config,
}

impl ReliableTransport {
    /// Creates the transport and starts its dispatch loop.
    pub fn new(network: NetworkTx, rx: HostRx, local: VAddr) -> ReliableTransport {
        Self::with_config(network, rx, local, Config::default())
    }

    pub fn with_config(
        network: NetworkTx,
        rx: HostRx,
        local: VAddr,
        config: Config,
    ) -> ReliableTransport {
        let connections: Arc<ConnectionTable> = Arc::new(Mutex::new(HashMap::new()));
        let (accept_tx, accept_rx) = mpsc::channel();
        let dispatcher = Dispatcher {
            rx,
            network: network.clone(),
            local: local.clone(),
            connections: connections.clone(),
            accept_tx,
            config,
        };
        thread::Builder::new()
            .name(format!("dispatch-{}", local))
            .spawn(move || dispatcher.run())
            .expect("failed to spawn dispatch thread");
        debug!("{}: dispatch loop started", local);
        ReliableTransport {
            network,
            local,
            connections,
            accept_rx,
            config,
        }
    }

    /// Opens a connection toward `remote` and returns it. No handshake
    /// segment is sent; the first data segment establishes the peer side.
    pub fn connect(&self, remote: VAddr) -> ReliableConnection {
        let connection = connection::open(
            self.network.clone(),
            self.local.clone(),
            remote.clone(),
            &self.connections,
            self.config,
        );
        debug!("{} -> {}: connection opened", self.local, remote);
        connection
    }

    /// Blocks until a remote peer opens a connection to this host and
    /// returns it. `None` once the dispatch loop has stopped (the carrier
    /// closed), after which no connection can ever arrive.
    pub fn accept(&self) -> Option<ReliableConnection> {
        let connection = self.accept_rx.recv().ok()?;
        debug!(
            "{}: accepted connection from {}",
            self.local,
            connection.remote_addr()
        );
        Some(connection)
    }

    pub fn local_addr(&self) -> &VAddr {
        &self.local
    }
}

/// The background half of the transport: reads the network layer in a
/// loop and routes segments. Runs until the carrier closes.
struct Dispatcher {
    rx: HostRx,
    network: NetworkTx,
    local: VAddr,
    connections: Arc<ConnectionTable>,
    accept_tx: Sender<ReliableConnection>,
    config: Config,
}

impl Dispatcher {
    fn run(mut self) {
        loop {
            match self.rx.recv() {
                Ok(segment) => self.route(segment),
                Err(RxError::Shutdown) => break,
                // Dropped frames were already logged where they fell.
                Err(_) => continue,
            }
        }
        debug!("{}: dispatch loop stopped", self.local);
    }

    fn route(&mut self, segment: Segment) {
        let key: ConnectionKey = (
            segment.src().vip.clone(),
            segment.src().port,
            segment.dst_port(),
        );
        // Look up under the lock, dispatch outside it.
        let existing = self.connections.lock().unwrap().get(&key).cloned();
        if let Some(mailboxes) = existing {
            if mailboxes.dispatch(segment, &self.network) {
                self.remove(&key);
            }
            return;
        }

        match segment {
            Segment::Ack { ref src, .. } => {
                debug!(
                    "{}: stale ACK from {} dropped (no connection)",
                    self.local, src
                );
            }
            Segment::Fin { seq, ref src, .. } => {
                // The connection already finished closing and removed
                // itself; the ACK to this FIN must have been lost. Answer
                // again so the peer can finish too.
                let ack = Segment::Ack {
                    seq,
                    src: self.local.clone(),
                    dst_port: src.port,
                };
                match self.network.send(ack, &src.vip) {
                    Ok(()) => debug!("{}: re-ACKed FIN from {}", self.local, src),
                    Err(e) => warn!("{}: failed to re-ACK FIN from {}: {}", self.local, src, e),
                }
            }
            data @ Segment::Data { .. } => {
                // First segment of a new inbound connection.
                let remote = data.src().clone();
                let connection = connection::open(
                    self.network.clone(),
                    self.local.clone(),
                    remote.clone(),
                    &self.connections,
                    self.config,
                );
                connection.mailboxes().dispatch(data, &self.network);
                debug!("{}: new inbound connection from {}", self.local, remote);
                if self.accept_tx.send(connection).is_err() {
                    warn!(
                        "{}: accept queue gone, dropping inbound connection from {}",
                        self.local, remote
                    );
                    self.remove(&key);
                }
            }
        }
    }

    fn remove(&self, key: &ConnectionKey) {
        self.connections.lock().unwrap().remove(key);
        debug!("{}: connection removed (key={:?})", self.local, key);
    }
}
