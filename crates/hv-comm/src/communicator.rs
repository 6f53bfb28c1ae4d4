//! The communication contract the search coordinator is written against.

use hv_types::{EvalRecord, HvResult};

use crate::message::{Drained, RecordBatch};

/// A fixed set of `size` addressable ranks, each knowing its own index.
///
/// Sends are unordered relative to other ranks' sends; the only ordering
/// guarantee is causal — a record sent by rank R becomes visible to a
/// receiver no earlier than R produced it.
pub trait Communicator {
    /// This rank's identity index.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Non-blocking point-to-point send of one record to every other rank.
    /// Returns once all sends are dispatched; peer receipt is not
    /// acknowledged.
    fn send_all(&self, record: &EvalRecord) -> HvResult<()>;

    /// Same delivery mechanism, payload is the termination sentinel.
    fn send_all_termination(&self) -> HvResult<()>;

    /// Drain every pending peer message without blocking. One invocation may
    /// yield zero, one, or many records; callers must not assume
    /// exactly-once delivery per poll. Termination sentinels are reported on
    /// the outcome, never as records.
    fn recv_any(&self) -> Drained;

    /// Collective all-gather: every rank contributes `batch` and receives
    /// every other rank's contribution, returned in rank order with this
    /// rank's own contribution excluded. This is the only blocking
    /// operation — all ranks must reach it before any proceed.
    fn broadcast(&self, batch: RecordBatch) -> HvResult<Vec<RecordBatch>>;
}
