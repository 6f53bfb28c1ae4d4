//! The closed set of messages ranks exchange.

use serde::{Deserialize, Serialize};

use hv_types::{EvalRecord, InfoTable, Point};

/// A point-to-point message.
///
/// `Termination` is the distinguished sentinel: distinct from any possible
/// evaluation record, it signals run shutdown and must never reach a
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Record(EvalRecord),
    Termination,
}

/// A batch of buffered records contributed to one collective exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub points: Vec<Point>,
    pub objectives: Vec<f64>,
    pub infos: InfoTable,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Outcome of one [`Communicator::recv_any`](crate::Communicator::recv_any)
/// drain pass. Sentinels are counted, never returned as records.
#[derive(Debug, Default)]
pub struct Drained {
    pub records: Vec<EvalRecord>,
    pub saw_termination: bool,
}
