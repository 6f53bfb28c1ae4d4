//! In-process communicator backed by a full mesh of crossbeam channels.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use hv_types::{CommError, EvalRecord, HvResult};

use crate::communicator::Communicator;
use crate::message::{Drained, Message, RecordBatch};

/// One rank's endpoint in a fixed `size`-rank mesh.
///
/// Point-to-point traffic and collective exchanges travel over separate
/// channel sets so that a broadcast can never interleave with pending
/// `send_all` records. All channels are unbounded: `send_all` dispatches
/// without blocking and `recv_any` drains with `try_recv` only.
pub struct ChannelCommunicator {
    rank: usize,
    size: usize,
    /// Outgoing point-to-point channels, indexed by destination rank.
    p2p_tx: Vec<Option<Sender<Message>>>,
    /// Incoming point-to-point channels, indexed by source rank.
    p2p_rx: Vec<Option<Receiver<Message>>>,
    /// Outgoing collective channels, indexed by destination rank.
    coll_tx: Vec<Option<Sender<RecordBatch>>>,
    /// Incoming collective channels, indexed by source rank.
    coll_rx: Vec<Option<Receiver<RecordBatch>>>,
}

impl ChannelCommunicator {
    /// Build the full rank-to-rank mesh and hand each rank its endpoint.
    pub fn mesh(size: usize) -> Vec<ChannelCommunicator> {
        let mut p2p_tx: Vec<Vec<Option<Sender<Message>>>> = empty_matrix(size);
        let mut p2p_rx: Vec<Vec<Option<Receiver<Message>>>> = empty_matrix(size);
        let mut coll_tx: Vec<Vec<Option<Sender<RecordBatch>>>> = empty_matrix(size);
        let mut coll_rx: Vec<Vec<Option<Receiver<RecordBatch>>>> = empty_matrix(size);

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = unbounded();
                p2p_tx[src][dst] = Some(tx);
                p2p_rx[dst][src] = Some(rx);

                let (tx, rx) = unbounded();
                coll_tx[src][dst] = Some(tx);
                coll_rx[dst][src] = Some(rx);
            }
        }

        info!(size, "communicator mesh created");

        (0..size)
            .map(|rank| ChannelCommunicator {
                rank,
                size,
                p2p_tx: std::mem::take(&mut p2p_tx[rank]),
                p2p_rx: std::mem::take(&mut p2p_rx[rank]),
                coll_tx: std::mem::take(&mut coll_tx[rank]),
                coll_rx: std::mem::take(&mut coll_rx[rank]),
            })
            .collect()
    }

    fn dispatch(&self, message: Message) -> HvResult<()> {
        for dst in 0..self.size {
            if let Some(tx) = &self.p2p_tx[dst] {
                tx.send(message.clone()).map_err(|_| CommError::Disconnected {
                    from: self.rank,
                    to: dst,
                })?;
            }
        }
        Ok(())
    }
}

fn empty_matrix<T>(size: usize) -> Vec<Vec<Option<T>>> {
    (0..size)
        .map(|_| (0..size).map(|_| None).collect())
        .collect()
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_all(&self, record: &EvalRecord) -> HvResult<()> {
        debug!(rank = self.rank, "sending record to all peers");
        self.dispatch(Message::Record(record.clone()))
    }

    fn send_all_termination(&self) -> HvResult<()> {
        info!(rank = self.rank, "sending termination sentinel to all peers");
        self.dispatch(Message::Termination)
    }

    fn recv_any(&self) -> Drained {
        let mut drained = Drained::default();
        for src in 0..self.size {
            if let Some(rx) = &self.p2p_rx[src] {
                while let Ok(message) = rx.try_recv() {
                    match message {
                        Message::Record(record) => drained.records.push(record),
                        Message::Termination => drained.saw_termination = true,
                    }
                }
            }
        }
        debug!(
            rank = self.rank,
            received = drained.records.len(),
            "drained peer messages"
        );
        drained
    }

    fn broadcast(&self, batch: RecordBatch) -> HvResult<Vec<RecordBatch>> {
        for dst in 0..self.size {
            if let Some(tx) = &self.coll_tx[dst] {
                tx.send(batch.clone()).map_err(|_| CommError::Disconnected {
                    from: self.rank,
                    to: dst,
                })?;
            }
        }

        let mut batches = Vec::with_capacity(self.size.saturating_sub(1));
        for src in 0..self.size {
            if let Some(rx) = &self.coll_rx[src] {
                let peer_batch = rx
                    .recv()
                    .map_err(|_| CommError::CollectiveDisconnected { from: src })?;
                batches.push(peer_batch);
            }
        }

        let received: usize = batches.iter().map(|b| b.len()).sum();
        info!(rank = self.rank, received, "broadcast exchange complete");
        Ok(batches)
    }
}
