//! Parameter-space definition: an ordered list of named dimensions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ShapeError;
use crate::record::{Point, Value};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Human-readable parameter name (e.g. "learning_rate").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

/// The full search space: an ordered list of parameter definitions.
///
/// The declaration order is the positional order of every [`Point`] produced
/// or recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    /// Dimensionality of every point in this space.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Draw one point uniformly from the space.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Point {
        self.parameters
            .iter()
            .map(|param| match &param.kind {
                ParameterKind::FloatRange { low, high } => {
                    Value::Float(rng.gen_range(*low..=*high))
                }
                ParameterKind::IntRange { low, high } => Value::Int(rng.gen_range(*low..=*high)),
                ParameterKind::LogUniform { low, high } => {
                    let log_val: f64 = rng.gen_range(low.ln()..=high.ln());
                    Value::Float(log_val.exp())
                }
            })
            .collect()
    }

    /// Translate a positional point into a name → value mapping using the
    /// declared parameter order.
    pub fn to_map(&self, point: &Point) -> Result<HashMap<String, Value>, ShapeError> {
        if point.len() != self.parameters.len() {
            return Err(ShapeError::PointArity {
                expected: self.parameters.len(),
                actual: point.len(),
            });
        }
        Ok(self
            .parameters
            .iter()
            .zip(point)
            .map(|(param, value)| (param.name.clone(), *value))
            .collect())
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}
