//! Surrogate model interface and the built-in reference implementations.
//!
//! The coordinator only speaks ask/tell: "ask" proposes exactly one
//! candidate point, "tell" feeds observed (point, objective) pairs back.
//! Objectives handed to `tell` are the internally-negated values, so lower
//! is better from the model's perspective.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use hv_types::{config_error, HvError, HvResult, ParameterKind, Point, SearchSpace, Value};

/// External predictive-model contract.
pub trait SurrogateModel: Send {
    /// Propose exactly one candidate point. Never batched.
    fn ask(&mut self) -> Point;

    /// Update the model with observed pairs.
    fn tell(&mut self, points: &[Point], objectives: &[f64]);

    /// How many observations the model has been told. The coordinator uses
    /// this to re-derive the refit window every iteration.
    fn observed(&self) -> usize;
}

/// The fixed enumeration of built-in surrogate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurrogateKind {
    /// Uniform random sampling; ignores observations.
    Dummy,
    /// Random warm-up, then ε-greedy perturbation of the best observed point.
    Perturb,
}

impl FromStr for SurrogateKind {
    type Err = HvError;

    fn from_str(name: &str) -> HvResult<Self> {
        match name {
            "dummy" => Ok(Self::Dummy),
            "perturb" => Ok(Self::Perturb),
            other => Err(config_error!(
                "Unknown surrogate model '{other}', please choose among [dummy, perturb]"
            )),
        }
    }
}

/// Construct a surrogate of the given kind, seeded explicitly.
pub fn build_surrogate(
    kind: SurrogateKind,
    space: SearchSpace,
    n_initial_points: usize,
    seed: u64,
) -> Box<dyn SurrogateModel> {
    match kind {
        SurrogateKind::Dummy => Box::new(DummySurrogate::new(space, seed)),
        SurrogateKind::Perturb => Box::new(PerturbSurrogate::new(space, n_initial_points, seed)),
    }
}

/// Uniform random proposals; `tell` only advances the observation count.
pub struct DummySurrogate {
    space: SearchSpace,
    rng: ChaCha8Rng,
    observed: usize,
}

impl DummySurrogate {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
            observed: 0,
        }
    }
}

impl SurrogateModel for DummySurrogate {
    fn ask(&mut self) -> Point {
        self.space.sample(&mut self.rng)
    }

    fn tell(&mut self, points: &[Point], _objectives: &[f64]) {
        self.observed += points.len();
    }

    fn observed(&self) -> usize {
        self.observed
    }
}

/// Warm-up with `n_initial_points` uniform samples, then perturb the best
/// (lowest-objective) observed point, keeping an exploration fraction of
/// pure random proposals.
pub struct PerturbSurrogate {
    space: SearchSpace,
    rng: ChaCha8Rng,
    n_initial_points: usize,
    exploration: f64,
    observations: Vec<(Point, f64)>,
}

impl PerturbSurrogate {
    pub fn new(space: SearchSpace, n_initial_points: usize, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
            n_initial_points,
            exploration: 0.1,
            observations: Vec::new(),
        }
    }

    fn best(&self) -> Option<&Point> {
        self.observations
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(point, _)| point)
    }

    /// Perturb `base` within each dimension's bounds.
    fn perturb(&mut self, base: &Point) -> Point {
        let parameters = self.space.parameters.clone();
        parameters
            .iter()
            .zip(base)
            .map(|(param, value)| match (&param.kind, value) {
                (ParameterKind::FloatRange { low, high }, Value::Float(v)) => {
                    let noise = self.rng.gen_range(-0.1..0.1) * (high - low);
                    Value::Float((v + noise).clamp(*low, *high))
                }
                (ParameterKind::IntRange { low, high }, Value::Int(v)) => {
                    let delta: i64 = self.rng.gen_range(-2..=2);
                    Value::Int((v + delta).clamp(*low, *high))
                }
                (ParameterKind::LogUniform { low, high }, Value::Float(v)) => {
                    let noise = self.rng.gen_range(-0.1..0.1) * (high.ln() - low.ln());
                    Value::Float((v.ln() + noise).exp().clamp(*low, *high))
                }
                // Mismatched cell kind: fall back to a fresh sample.
                (kind, _) => sample_one(kind, &mut self.rng),
            })
            .collect()
    }
}

fn sample_one<R: Rng>(kind: &ParameterKind, rng: &mut R) -> Value {
    match kind {
        ParameterKind::FloatRange { low, high } => Value::Float(rng.gen_range(*low..=*high)),
        ParameterKind::IntRange { low, high } => Value::Int(rng.gen_range(*low..=*high)),
        ParameterKind::LogUniform { low, high } => {
            Value::Float(rng.gen_range(low.ln()..=high.ln()).exp())
        }
    }
}

impl SurrogateModel for PerturbSurrogate {
    fn ask(&mut self) -> Point {
        if self.observations.len() < self.n_initial_points
            || self.rng.gen::<f64>() < self.exploration
        {
            return self.space.sample(&mut self.rng);
        }
        match self.best().cloned() {
            Some(base) => self.perturb(&base),
            None => self.space.sample(&mut self.rng),
        }
    }

    fn tell(&mut self, points: &[Point], objectives: &[f64]) {
        for (point, objective) in points.iter().zip(objectives) {
            self.observations.push((point.clone(), *objective));
        }
    }

    fn observed(&self) -> usize {
        self.observations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_float("x", 0.0, 1.0)
            .add_int("n", 1, 10)
    }

    #[test]
    fn unknown_kind_is_a_configuration_error() {
        let err = "GP".parse::<SurrogateKind>().unwrap_err();
        assert!(matches!(err, HvError::Config(_)));
        assert!(err.to_string().contains("GP"));
    }

    #[test]
    fn dummy_is_deterministic_for_a_fixed_seed() {
        let mut a = DummySurrogate::new(space(), 11);
        let mut b = DummySurrogate::new(space(), 11);
        for _ in 0..10 {
            assert_eq!(a.ask(), b.ask());
        }
    }

    #[test]
    fn dummy_tracks_observation_count_only() {
        let mut model = DummySurrogate::new(space(), 0);
        assert_eq!(model.observed(), 0);
        let points = vec![vec![Value::Float(0.5), Value::Int(3)]; 4];
        model.tell(&points, &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(model.observed(), 4);
    }

    #[test]
    fn perturb_warms_up_then_stays_in_bounds() {
        let mut model = PerturbSurrogate::new(space(), 2, 5);
        model.tell(
            &[
                vec![Value::Float(0.5), Value::Int(5)],
                vec![Value::Float(0.9), Value::Int(2)],
            ],
            &[-1.0, -4.0],
        );
        for _ in 0..50 {
            let point = model.ask();
            match (&point[0], &point[1]) {
                (Value::Float(x), Value::Int(n)) => {
                    assert!((0.0..=1.0).contains(x));
                    assert!((1..=10).contains(n));
                }
                other => panic!("unexpected point shape: {other:?}"),
            }
        }
    }

    #[test]
    fn perturb_exploits_the_lowest_objective() {
        let mut model = PerturbSurrogate::new(space(), 1, 5);
        model.exploration = 0.0;
        model.tell(
            &[
                vec![Value::Float(0.2), Value::Int(3)],
                vec![Value::Float(0.8), Value::Int(9)],
            ],
            &[10.0, -10.0],
        );
        // Best is (0.8, 9); perturbations stay within ±10% / ±2 of it.
        for _ in 0..50 {
            let point = model.ask();
            match (&point[0], &point[1]) {
                (Value::Float(x), Value::Int(n)) => {
                    assert!((*x - 0.8).abs() <= 0.1 + 1e-12);
                    assert!((*n - 9).abs() <= 2);
                }
                other => panic!("unexpected point shape: {other:?}"),
            }
        }
    }
}
