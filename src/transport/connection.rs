use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use super::{Config, ConnectionKey, ConnectionTable};
use crate::addr::VAddr;
use crate::network::NetworkTx;
use crate::wire::Segment;
use crate::TxResult;

/// Lifecycle of one connection, readable through
/// [`ReliableConnection::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Open for traffic in both directions.
    Active,
    /// The peer sent a FIN. Buffered data can still be drained; the next
    /// receive after that observes end-of-stream.
    HalfClosedByPeer,
    /// A local `close` is in progress.
    Closing,
    /// Finalized. The multiplexer no longer knows this connection.
    Closed,
}

/// One in-order data chunk as it sits in the data mailbox.
pub(crate) struct DataChunk {
    pub seq: u8,
    pub data: Vec<u8>,
    pub more: bool,
}

/// The dispatch-facing half of a connection: the mailbox senders the
/// dispatch loop feeds and the state both threads observe. One copy
/// lives in the multiplexer's table and one inside the connection
/// itself, so a mailbox never disconnects while the application still
/// holds the connection.
pub(crate) struct Mailboxes {
    local: VAddr,
    remote: VAddr,
    ack_tx: Sender<u8>,
    data_tx: Sender<Option<DataChunk>>,
    state: Mutex<ConnectionState>,
}

impl Mailboxes {
    /// Routes one inbound segment into the right mailbox: ACKs to the
    /// ack mailbox, data to the data mailbox, and a FIN is ACKed here
    /// and turned into the end-of-stream sentinel. Returns true when the
    /// connection finalized and must leave the table.
    pub fn dispatch(&self, segment: Segment, network: &NetworkTx) -> bool {
        match segment {
            Segment::Fin { seq, .. } => {
                debug!("{}: FIN received from {}", self.local, self.remote);
                {
                    // Before the ACK goes out, so the peer never sees its
                    // FIN confirmed while this side still looks Active.
                    let mut state = self.state.lock().unwrap();
                    if *state == ConnectionState::Active {
                        *state = ConnectionState::HalfClosedByPeer;
                    }
                }
                self.send_ack(seq, network);
                let _ = self.data_tx.send(None);
                true
            }
            Segment::Ack { seq, .. } => {
                debug!("{}: ACK dispatched (seq={})", self.local, seq);
                let _ = self.ack_tx.send(seq);
                false
            }
            Segment::Data { seq, data, more, .. } => {
                debug!(
                    "{}: data dispatched (seq={} len={})",
                    self.local,
                    seq,
                    data.len()
                );
                let _ = self.data_tx.send(Some(DataChunk { seq, data, more }));
                false
            }
        }
    }

    /// Emits an ACK for `seq` toward the remote side. ACK loss is
    /// covered by the sender's retransmission, so failures only log.
    fn send_ack(&self, seq: u8, network: &NetworkTx) {
        let ack = Segment::Ack {
            seq,
            src: self.local.clone(),
            dst_port: self.remote.port,
        };
        match network.send(ack, &self.remote.vip) {
            Ok(()) => debug!("{} -> {}: ACK sent (seq={})", self.local, self.remote, seq),
            Err(e) => warn!("{} -> {}: failed to send ACK: {}", self.local, self.remote, e),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }
}

/// Creates a connection, registers its mailboxes in the table under
/// `(remote.vip, remote.port, local.port)` and returns the
/// application-facing handle. An existing entry under the same key is
/// replaced.
pub(crate) fn open(
    network: NetworkTx,
    local: VAddr,
    remote: VAddr,
    connections: &Arc<ConnectionTable>,
    config: Config,
) -> ReliableConnection {
    let (ack_tx, ack_rx) = mpsc::channel();
    let (data_tx, data_rx) = mpsc::channel();
    let mailboxes = Arc::new(Mailboxes {
        local: local.clone(),
        remote: remote.clone(),
        ack_tx,
        data_tx,
        state: Mutex::new(ConnectionState::Active),
    });
    let key: ConnectionKey = (remote.vip.clone(), remote.port, local.port);
    connections
        .lock()
        .unwrap()
        .insert(key.clone(), mailboxes.clone());
    ReliableConnection {
        network,
        mailboxes,
        ack_rx,
        data_rx,
        send_sequence: 0,
        receive_sequence: 0,
        connections: Arc::downgrade(connections),
        key,
        config,
    }
}

/// One reliable Stop-and-Wait byte stream between two virtual endpoints.
///
/// Sending chunks data at the configured MSS and keeps a single segment
/// in flight: each chunk is retransmitted on timeout until the ACK
/// carrying its sequence number arrives, then the sequence bit flips.
/// Receiving accepts chunks strictly in sequence, re-ACKs duplicates and
/// reassembles chunks until one arrives with `more` unset.
pub struct ReliableConnection {
    network: NetworkTx,
    mailboxes: Arc<Mailboxes>,
    ack_rx: Receiver<u8>,
    data_rx: Receiver<Option<DataChunk>>,
    send_sequence: u8,
    receive_sequence: u8,
    connections: Weak<ConnectionTable>,
    key: ConnectionKey,
    config: Config,
}

impl ReliableConnection {
    pub fn local_addr(&self) -> &VAddr {
        &self.mailboxes.local
    }

    pub fn remote_addr(&self) -> &VAddr {
        &self.mailboxes.remote
    }

    pub fn state(&self) -> ConnectionState {
        self.mailboxes.state()
    }

    pub(crate) fn mailboxes(&self) -> Arc<Mailboxes> {
        self.mailboxes.clone()
    }

    /// Sends `data` reliably, splitting it into MSS-sized chunks and
    /// waiting for each chunk's ACK before the next one goes out. An
    /// empty `data` still sends one empty chunk.
    ///
    /// Data retransmission never gives up: a persistently unreachable
    /// peer makes this call block forever. Only configuration errors
    /// (no route, no ARP entry) return early.
    pub fn send(&mut self, data: &[u8]) -> TxResult {
        debug!(
            "{} -> {}: sending {} byte(s)",
            self.mailboxes.local,
            self.mailboxes.remote,
            data.len()
        );
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(self.config.mss).collect()
        };
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            self.send_chunk(chunk, i < last)?;
        }
        Ok(())
    }

    fn send_chunk(&mut self, chunk: &[u8], more: bool) -> TxResult {
        let segment = Segment::Data {
            seq: self.send_sequence,
            src: self.mailboxes.local.clone(),
            dst_port: self.mailboxes.remote.port,
            data: chunk.to_vec(),
            more,
        };
        loop {
            self.network
                .send(segment.clone(), &self.mailboxes.remote.vip)?;
            let deadline = Instant::now() + self.config.timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match self.ack_rx.recv_timeout(remaining) {
                    Ok(seq) if seq == self.send_sequence => {
                        debug!(
                            "{} -> {}: chunk confirmed (seq={})",
                            self.mailboxes.local, self.mailboxes.remote, self.send_sequence
                        );
                        self.send_sequence ^= 1;
                        return Ok(());
                    }
                    Ok(seq) => {
                        debug!(
                            "{}: duplicate ACK discarded (got={} expected={})",
                            self.mailboxes.local, seq, self.send_sequence
                        );
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    // Unreachable while we hold `mailboxes`; treated as a
                    // timeout all the same.
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            warn!(
                "{} -> {}: timeout, retransmitting (seq={})",
                self.mailboxes.local, self.mailboxes.remote, self.send_sequence
            );
        }
    }

    /// Receives one logical message, blocking until every chunk of it
    /// has arrived. Returns `None` when the peer closed the connection.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        debug!("{}: waiting for data", self.mailboxes.local);
        let mut buffer = Vec::new();
        loop {
            let chunk = self.receive_chunk()?;
            buffer.extend_from_slice(&chunk.data);
            if !chunk.more {
                break;
            }
        }
        debug!(
            "{}: {} byte(s) received",
            self.mailboxes.local,
            buffer.len()
        );
        Some(buffer)
    }

    fn receive_chunk(&mut self) -> Option<DataChunk> {
        loop {
            let item = self.data_rx.recv().ok()?;
            let chunk = match item {
                // End-of-stream sentinel: the peer sent a FIN.
                None => {
                    self.mailboxes.set_state(ConnectionState::Closed);
                    return None;
                }
                Some(chunk) => chunk,
            };
            if chunk.seq != self.receive_sequence {
                debug!(
                    "{}: duplicate chunk discarded (got={} expected={})",
                    self.mailboxes.local, chunk.seq, self.receive_sequence
                );
                // Our ACK was lost; confirm the previous sequence again.
                self.mailboxes
                    .send_ack(self.receive_sequence ^ 1, &self.network);
                continue;
            }
            self.mailboxes.send_ack(chunk.seq, &self.network);
            self.receive_sequence ^= 1;
            debug!(
                "{}: chunk accepted (seq={})",
                self.mailboxes.local, chunk.seq
            );
            return Some(chunk);
        }
    }

    /// Closes the connection: sends a FIN and waits for its ACK,
    /// retransmitting at most `max_fin_retries` times. After the retries
    /// are exhausted the connection is declared closed locally anyway.
    /// The sequence number does not flip; the connection is going away.
    pub fn close(&mut self) -> TxResult {
        self.mailboxes.set_state(ConnectionState::Closing);
        let fin = Segment::Fin {
            seq: self.send_sequence,
            src: self.mailboxes.local.clone(),
            dst_port: self.mailboxes.remote.port,
        };
        for attempt in 1..=self.config.max_fin_retries {
            self.network.send(fin.clone(), &self.mailboxes.remote.vip)?;
            debug!(
                "{} -> {}: FIN sent (seq={})",
                self.mailboxes.local, self.mailboxes.remote, self.send_sequence
            );
            let deadline = Instant::now() + self.config.timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match self.ack_rx.recv_timeout(remaining) {
                    Ok(seq) if seq == self.send_sequence => {
                        debug!(
                            "{} -> {}: connection closed",
                            self.mailboxes.local, self.mailboxes.remote
                        );
                        self.finalize();
                        return Ok(());
                    }
                    // Stale ACK for the previous chunk; keep draining.
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            warn!(
                "{} -> {}: timeout waiting for FIN ACK ({}/{})",
                self.mailboxes.local, self.mailboxes.remote, attempt, self.config.max_fin_retries
            );
        }
        warn!(
            "{} -> {}: FIN unacknowledged after {} attempts, closing anyway",
            self.mailboxes.local, self.mailboxes.remote, self.config.max_fin_retries
        );
        self.finalize();
        Ok(())
    }

    /// Marks the connection closed and removes it from the multiplexer's
    /// table. Safe to call more than once.
    fn finalize(&self) {
        self.mailboxes.set_state(ConnectionState::Closed);
        if let Some(connections) = self.connections.upgrade() {
            connections.lock().unwrap().remove(&self.key);
            debug!(
                "{}: connection removed (key={:?})",
                self.mailboxes.local, self.key
            );
        }
    }
}
