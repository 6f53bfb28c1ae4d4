//! # hv-search
//!
//! Distributed model-based search: each rank runs the same ask → evaluate →
//! tell → communicate cycle, sharing evaluation results with peers so a
//! per-rank surrogate model stays current without a central coordinator.
//!
//! The communication layer lives in `hv-comm`; shared data types in
//! `hv-types`. This crate owns the history buffer, scalarization,
//! surrogate implementations, the coordinator state machine, and result
//! aggregation.

mod config;
mod coordinator;
mod history;
mod results;
mod scalarize;
mod surrogate;

pub use config::{SearchConfig, SearchId};
pub use coordinator::{
    derive_rank_seeds, SearchCoordinator, SearchState, KEY_TIMESTAMP_END, KEY_TIMESTAMP_START,
    KEY_WORKER_RANK,
};
pub use history::History;
pub use results::ResultTable;
pub use scalarize::{ScalarKind, Scalarizer};
pub use surrogate::{
    build_surrogate, DummySurrogate, PerturbSurrogate, SurrogateKind, SurrogateModel,
};
