//! Scalarization of multi-objective outcomes.
//!
//! Stateless reductions from a vector of objectives to one scalar, used when
//! the search target is multi-objective. Weight vectors are drawn once at
//! construction from the seeded generator passed in; no ambient randomness.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use hv_types::{config_error, HvError, HvResult, Objective, ShapeError};

/// Floor applied to per-objective ranges when computing scaling factors.
const RANGE_EPSILON: f64 = 1e-6;

/// Which scalarizing function to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Weighted sum with a random non-negative weight vector summing to 1.
    Linear,
    /// Worst-case weighted deviation from the utopia point.
    Chebyshev,
    /// Penalty-based boundary intersection.
    Pbi,
}

impl FromStr for ScalarKind {
    type Err = HvError;

    fn from_str(name: &str) -> HvResult<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "chebyshev" => Ok(Self::Chebyshev),
            "pbi" => Ok(Self::Pbi),
            other => Err(config_error!(
                "Unknown scalarization '{other}', please choose among [linear, chebyshev, pbi]"
            )),
        }
    }
}

/// A scalarizing function, immutable apart from the normalization constants
/// refreshed by [`Scalarizer::normalize`].
#[derive(Debug, Clone)]
pub struct Scalarizer {
    kind: ScalarKind,
    n_objectives: usize,
    weight: Vec<f64>,
    weight_norm_sq: f64,
    utopia_point: Option<Vec<f64>>,
    scaling: Vec<f64>,
    penalty: f64,
}

impl Scalarizer {
    pub fn new<R: Rng>(
        kind: ScalarKind,
        n_objectives: usize,
        utopia_point: Option<Vec<f64>>,
        penalty: f64,
        rng: &mut R,
    ) -> HvResult<Self> {
        if n_objectives == 0 {
            return Err(config_error!("'n_objectives' must be a positive integer"));
        }
        if let Some(utopia) = &utopia_point {
            if utopia.len() != n_objectives {
                return Err(ShapeError::ObjectiveArity {
                    expected: n_objectives,
                    actual: utopia.len(),
                }
                .into());
            }
        }

        let mut weight: Vec<f64> = (0..n_objectives).map(|_| rng.gen::<f64>()).collect();
        if kind == ScalarKind::Linear {
            let total: f64 = weight.iter().sum();
            for w in &mut weight {
                *w /= total;
            }
        }
        let weight_norm_sq = weight.iter().map(|w| w * w).sum();

        Ok(Self {
            kind,
            n_objectives,
            weight,
            weight_norm_sq,
            utopia_point,
            scaling: vec![1.0; n_objectives],
            penalty: penalty.abs(),
        })
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn n_objectives(&self) -> usize {
        self.n_objectives
    }

    pub fn utopia_point(&self) -> Option<&[f64]> {
        self.utopia_point.as_deref()
    }

    pub fn scaling(&self) -> &[f64] {
        &self.scaling
    }

    /// Reduce an objective to one scalar. A scalar input is the identity
    /// (requires `n_objectives == 1`); a vector input must match the
    /// declared arity.
    pub fn scalarize(&self, y: &Objective) -> HvResult<f64> {
        match y {
            Objective::Scalar(v) => {
                if self.n_objectives != 1 {
                    return Err(ShapeError::ObjectiveArity {
                        expected: self.n_objectives,
                        actual: 1,
                    }
                    .into());
                }
                Ok(*v)
            }
            Objective::Vector(v) => {
                self.check_shape(v)?;
                self.scalarize_vector(v)
            }
        }
    }

    fn scalarize_vector(&self, y: &[f64]) -> HvResult<f64> {
        match self.kind {
            ScalarKind::Linear => Ok(dot(&self.weight, y)),
            ScalarKind::Chebyshev => {
                let deviation = self.translate(y)?;
                Ok(self
                    .weight
                    .iter()
                    .zip(&deviation)
                    .map(|(w, d)| w * d.abs())
                    .fold(f64::NEG_INFINITY, f64::max))
            }
            ScalarKind::Pbi => {
                let deviation = self.translate(y)?;
                let d1 = dot(&self.weight, &deviation) / self.weight_norm_sq;
                let d2: f64 = deviation
                    .iter()
                    .zip(&self.weight)
                    .map(|(d, w)| (d - d1 * w).abs())
                    .sum();
                Ok(d1 + self.penalty * d2)
            }
        }
    }

    /// Elementwise `scaling ⊙ (y − utopia)`.
    fn translate(&self, y: &[f64]) -> HvResult<Vec<f64>> {
        let utopia = self.utopia_point.as_ref().ok_or_else(|| {
            config_error!("utopia_point is not set; call normalize() or supply it at construction")
        })?;
        Ok(y.iter()
            .zip(utopia)
            .zip(&self.scaling)
            .map(|((yi, ui), si)| si * (yi - ui))
            .collect())
    }

    /// Recompute `utopia_point` (elementwise minimum observed) and `scaling`
    /// (inverse range, floored at ε) from a sample of vector objectives.
    pub fn normalize(&mut self, ys: &[Vec<f64>]) -> HvResult<()> {
        if ys.is_empty() {
            return Err(config_error!("normalize() requires at least one objective vector"));
        }
        for y in ys {
            self.check_shape(y)?;
        }
        let mut y_min = ys[0].clone();
        let mut y_max = ys[0].clone();
        for y in &ys[1..] {
            for i in 0..self.n_objectives {
                y_min[i] = y_min[i].min(y[i]);
                y_max[i] = y_max[i].max(y[i]);
            }
        }
        self.scaling = y_min
            .iter()
            .zip(&y_max)
            .map(|(lo, hi)| 1.0 / (hi - lo).max(RANGE_EPSILON))
            .collect();
        self.utopia_point = Some(y_min);
        Ok(())
    }

    fn check_shape(&self, y: &[f64]) -> HvResult<()> {
        if y.len() != self.n_objectives {
            return Err(ShapeError::ObjectiveArity {
                expected: self.n_objectives,
                actual: y.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
