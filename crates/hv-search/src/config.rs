//! Run configuration for a distributed search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use hv_types::{config_error, HvResult};

use crate::scalarize::ScalarKind;
use crate::surrogate::SurrogateKind;

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Top-level configuration for one search run, shared by every rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub id: SearchId,
    pub created_at: DateTime<Utc>,

    /// Master seed; per-rank seeds are derived from it. `None` seeds from
    /// entropy.
    pub random_state: Option<u64>,

    /// Directory the final results table is written to (rank 0 only).
    pub log_dir: PathBuf,

    /// Synchronous (collective batch) vs asynchronous (fire-and-forget)
    /// propagation. Fixed for the run.
    pub sync_communication: bool,

    /// Flush every time this many unflushed records accumulate. Only
    /// meaningful in synchronous mode.
    pub sync_communication_freq: usize,

    /// Warm-up proposals before the surrogate starts exploiting.
    pub n_initial_points: usize,

    /// Which surrogate model each rank builds.
    pub surrogate_model: SurrogateKind,

    /// Number of objectives the run function reports. 1 = single-objective.
    pub n_objectives: usize,

    /// Scalarization applied to vector objectives.
    pub scalarization: ScalarKind,

    /// PBI penalty factor (ignored by other scalarizations).
    pub moo_penalty: f64,

    /// Fixed utopia point; when absent it is re-derived from observed
    /// objectives before each scalarization.
    pub moo_utopia: Option<Vec<f64>>,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            random_state: None,
            log_dir: PathBuf::from("."),
            sync_communication: false,
            sync_communication_freq: 10,
            n_initial_points: 10,
            surrogate_model: SurrogateKind::Dummy,
            n_objectives: 1,
            scalarization: ScalarKind::Linear,
            moo_penalty: 100.0,
            moo_utopia: None,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_sync_communication(mut self, freq: usize) -> Self {
        self.sync_communication = true;
        self.sync_communication_freq = freq;
        self
    }

    pub fn with_n_initial_points(mut self, n: usize) -> Self {
        self.n_initial_points = n;
        self
    }

    pub fn with_surrogate_model(mut self, kind: SurrogateKind) -> Self {
        self.surrogate_model = kind;
        self
    }

    pub fn with_objectives(mut self, n: usize, scalarization: ScalarKind) -> Self {
        self.n_objectives = n;
        self.scalarization = scalarization;
        self
    }

    pub fn with_moo_penalty(mut self, penalty: f64) -> Self {
        self.moo_penalty = penalty;
        self
    }

    pub fn with_moo_utopia(mut self, utopia: Vec<f64>) -> Self {
        self.moo_utopia = Some(utopia);
        self
    }

    /// Reject invalid combinations before the run starts.
    pub fn validate(&self) -> HvResult<()> {
        if self.n_objectives == 0 {
            return Err(config_error!("'n_objectives' must be a positive integer"));
        }
        if self.sync_communication && self.sync_communication_freq == 0 {
            return Err(config_error!(
                "'sync_communication_freq' must be a positive integer"
            ));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let config = SearchConfig::new()
            .with_random_state(42)
            .with_log_dir("/tmp/run")
            .with_sync_communication(5)
            .with_n_initial_points(3)
            .with_surrogate_model(SurrogateKind::Perturb);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/run"));
        assert!(config.sync_communication);
        assert_eq!(config.sync_communication_freq, 5);
        assert_eq!(config.n_initial_points, 3);
        assert_eq!(config.surrogate_model, SurrogateKind::Perturb);
        config.validate().unwrap();
    }

    #[test]
    fn zero_sync_frequency_is_rejected() {
        let config = SearchConfig::new().with_sync_communication(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_objectives_is_rejected() {
        let mut config = SearchConfig::new();
        config.n_objectives = 0;
        assert!(config.validate().is_err());
    }
}
