//! Evaluation records exchanged between worker ranks.

use serde::{Deserialize, Serialize};

use crate::errors::ShapeError;

/// A single parameter or info cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    /// Numeric view used by surrogate models and result columns.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One candidate point: positional parameter values ordered per the search
/// space declaration.
pub type Point = Vec<Value>;

/// Raw objective shape returned by a run function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Objective {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// What a run function hands back to the coordinator.
///
/// `Profiled` carries wall-clock timestamps (seconds since the UNIX epoch);
/// the coordinator re-bases them to its own start time before recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunOutput {
    Objective(Objective),
    Profiled {
        objective: Objective,
        timestamp_start: f64,
        timestamp_end: f64,
    },
}

/// One evaluation result. Immutable once created.
///
/// `objective` is the internally-negated scalar (the coordinator always
/// maximizes; the sign is restored at final reporting). `info` is an ordered
/// tuple of auxiliary values whose names live in the history-wide schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub point: Point,
    pub objective: f64,
    pub info: Vec<Value>,
}

/// Columnar info block: a batch of N records' info values keyed by name.
/// Every column must hold exactly N values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InfoTable {
    pub keys: Vec<String>,
    pub columns: Vec<Vec<Value>>,
}

impl InfoTable {
    pub fn new(keys: Vec<String>, columns: Vec<Vec<Value>>) -> Self {
        Self { keys, columns }
    }

    /// Check that every column holds exactly `n` values.
    pub fn validate(&self, n: usize) -> Result<(), ShapeError> {
        for (key, column) in self.keys.iter().zip(&self.columns) {
            if column.len() != n {
                return Err(ShapeError::ColumnLength {
                    key: key.clone(),
                    expected: n,
                    actual: column.len(),
                });
            }
        }
        Ok(())
    }

    /// Transpose columns into N per-record info rows.
    pub fn rows(&self, n: usize) -> Vec<Vec<Value>> {
        (0..n)
            .map(|j| self.columns.iter().map(|col| col[j]).collect())
            .collect()
    }
}
