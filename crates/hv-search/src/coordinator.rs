//! The per-rank search loop: ask → evaluate → record → propagate → ingest →
//! refit, with a cooperative stop condition and loss-free shutdown.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hv_comm::{Communicator, Drained, RecordBatch};
use hv_types::{
    config_error, EvalRecord, HvResult, Objective, Point, RunOutput, SearchSpace, ShapeError,
    Value,
};

use crate::config::SearchConfig;
use crate::history::History;
use crate::results::ResultTable;
use crate::scalarize::Scalarizer;
use crate::surrogate::{build_surrogate, SurrogateModel};

/// Info key carried by every record: the producing rank.
pub const KEY_WORKER_RANK: &str = "worker_rank";
/// Info keys added once when the run function reports profiled output.
pub const KEY_TIMESTAMP_START: &str = "timestamp_start";
pub const KEY_TIMESTAMP_END: &str = "timestamp_end";

/// Info arity of a profiled record: rank plus two timestamps.
const PROFILED_INFO_LEN: usize = 3;

/// Lifecycle of one rank's coordinator. Terminal in `Stopped`; there is no
/// way back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Running,
    Stopping,
    Stopped,
}

/// Derive one seed per rank from the shared master seed. Every rank calls
/// this with the same arguments and takes its own entry.
pub fn derive_rank_seeds(random_state: Option<u64>, size: usize) -> Vec<u64> {
    let mut master = match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    (0..size).map(|_| master.gen()).collect()
}

/// Drives the search cycle for one rank.
///
/// Every rank runs the same loop concurrently; evaluation results travel
/// between ranks through the communicator as they are produced. The
/// coordinator owns this rank's [`History`] exclusively — peers never touch
/// it directly.
pub struct SearchCoordinator<C, F>
where
    C: Communicator,
    F: FnMut(&HashMap<String, Value>) -> HvResult<RunOutput>,
{
    config: SearchConfig,
    space: SearchSpace,
    run_function: F,
    comm: C,
    history: History,
    model: Box<dyn SurrogateModel>,
    scalarizer: Option<Scalarizer>,
    /// Raw vector objectives, kept for re-deriving normalization constants.
    moo_samples: Vec<Vec<f64>>,
    /// Whether the utopia point is re-derived from observations.
    auto_normalize: bool,
    state: SearchState,
    cancel: Arc<AtomicBool>,
    peer_terminated: bool,
    /// UNIX seconds at search start; profiled timestamps are re-based to it.
    start_stamp: f64,
}

impl<C, F> SearchCoordinator<C, F>
where
    C: Communicator,
    F: FnMut(&HashMap<String, Value>) -> HvResult<RunOutput>,
{
    pub fn new(space: SearchSpace, run_function: F, config: SearchConfig, comm: C) -> HvResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.log_dir)?;

        let rank_seed = derive_rank_seeds(config.random_state, comm.size())[comm.rank()];
        let mut rank_rng = ChaCha8Rng::seed_from_u64(rank_seed);

        let scalarizer = if config.n_objectives > 1 {
            Some(Scalarizer::new(
                config.scalarization,
                config.n_objectives,
                config.moo_utopia.clone(),
                config.moo_penalty,
                &mut rank_rng,
            )?)
        } else {
            None
        };

        let model = build_surrogate(
            config.surrogate_model,
            space.clone(),
            config.n_initial_points,
            rank_rng.gen(),
        );

        let mut history = History::new();
        history.append_info_keys(&[KEY_WORKER_RANK]);

        info!(
            rank = comm.rank(),
            size = comm.size(),
            "search coordinator created"
        );

        Ok(Self {
            auto_normalize: config.moo_utopia.is_none(),
            config,
            space,
            run_function,
            comm,
            history,
            model,
            scalarizer,
            moo_samples: Vec::new(),
            state: SearchState::Running,
            cancel: Arc::new(AtomicBool::new(false)),
            peer_terminated: false,
            start_stamp: 0.0,
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Execute the search.
    ///
    /// Stops once this rank's history reaches `max_evals` records
    /// (`max_evals < 0` runs unbounded), the timeout fires, or a peer's
    /// termination sentinel arrives. Returns the aggregated result table on
    /// rank 0 and `None` on every other rank.
    pub fn search(
        &mut self,
        max_evals: i64,
        timeout: Option<Duration>,
    ) -> HvResult<Option<ResultTable>> {
        if let Some(timeout) = timeout {
            self.arm_timeout(timeout)?;
        }
        self.start_stamp = unix_now();

        info!(rank = self.comm.rank(), max_evals, "starting search");
        self.run_loop(max_evals)?;

        self.state = SearchState::Stopping;
        if !self.peer_terminated {
            self.comm.send_all_termination()?;
        }
        self.state = SearchState::Stopped;

        if self.comm.rank() != 0 {
            return Ok(None);
        }

        // Final drain: collect in-flight records from peers still finishing
        // their last iteration before they observed termination.
        let drained = self.comm.recv_any();
        self.ingest(drained)?;

        let table = ResultTable::from_history(&self.space, &self.history)?;
        let path = self.results_path();
        table.write_csv(&path)?;
        info!(rows = table.len(), path = %path.display(), "results written");
        Ok(Some(table))
    }

    /// Where rank 0 persists the final table.
    pub fn results_path(&self) -> PathBuf {
        self.config.log_dir.join("results.csv")
    }

    fn run_loop(&mut self, max_evals: i64) -> HvResult<()> {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!(rank = self.comm.rank(), "timeout fired, stopping");
                break;
            }
            if self.peer_terminated {
                info!(rank = self.comm.rank(), "peer termination observed, stopping");
                break;
            }
            if max_evals >= 0 && self.history.len() as i64 >= max_evals {
                info!(
                    rank = self.comm.rank(),
                    evals = self.history.len(),
                    "evaluation budget reached, stopping"
                );
                break;
            }

            // Absorb pending peer records before the next ask. Synchronous
            // mode skips this: the collective exchange already ingested.
            if !self.config.sync_communication {
                let drained = self.comm.recv_any();
                self.ingest(drained)?;
                if self.peer_terminated {
                    continue;
                }
            }

            self.refit();

            let point = self.model.ask();
            let (objective, info) = self.evaluate(&point)?;

            let record = EvalRecord {
                point,
                objective,
                info,
            };
            self.history
                .append(record.point.clone(), record.objective, record.info.clone())?;

            self.propagate(&record)?;
        }
        Ok(())
    }

    /// Feed exactly the records the model has not seen yet. Re-derived every
    /// iteration because asynchronous receipt can add an arbitrary number of
    /// peer records between iterations.
    fn refit(&mut self) {
        let (points, objectives) = self.history.value();
        let n_new = points.len() - self.model.observed();
        if n_new == 0 {
            return;
        }
        debug!(n_new, "fitting the surrogate model");
        let start = points.len() - n_new;
        self.model.tell(&points[start..], &objectives[start..]);
    }

    /// Run the external evaluation function on one candidate and return the
    /// internally-negated objective plus the record's info tuple.
    fn evaluate(&mut self, point: &Point) -> HvResult<(f64, Vec<Value>)> {
        let params = self.space.to_map(point)?;

        debug!(rank = self.comm.rank(), "executing the run function");
        let t1 = Instant::now();
        let output = (self.run_function)(&params)?;
        debug!(elapsed_secs = t1.elapsed().as_secs_f64(), "run function returned");

        let mut info = vec![Value::Int(self.comm.rank() as i64)];
        let objective = match output {
            RunOutput::Objective(objective) => objective,
            RunOutput::Profiled {
                objective,
                timestamp_start,
                timestamp_end,
            } => {
                self.history
                    .append_info_keys(&[KEY_TIMESTAMP_START, KEY_TIMESTAMP_END]);
                info.push(Value::Float(timestamp_start - self.start_stamp));
                info.push(Value::Float(timestamp_end - self.start_stamp));
                objective
            }
        };

        // Internal convention is maximization; the sign is restored when the
        // final table is assembled.
        let y = self.reduce(objective)?;
        Ok((-y, info))
    }

    /// Collapse a raw objective to one scalar, scalarizing vectors.
    fn reduce(&mut self, objective: Objective) -> HvResult<f64> {
        let n_objectives = self.config.n_objectives;
        match objective {
            Objective::Scalar(y) => {
                if n_objectives != 1 {
                    return Err(ShapeError::ObjectiveArity {
                        expected: n_objectives,
                        actual: 1,
                    }
                    .into());
                }
                Ok(y)
            }
            Objective::Vector(y) => {
                if y.len() != n_objectives {
                    return Err(ShapeError::ObjectiveArity {
                        expected: n_objectives,
                        actual: y.len(),
                    }
                    .into());
                }
                match self.scalarizer.as_mut() {
                    // Single-objective runs accept a length-1 vector as-is.
                    None => Ok(y[0]),
                    Some(scalarizer) => {
                        self.moo_samples.push(y.clone());
                        if self.auto_normalize {
                            scalarizer.normalize(&self.moo_samples)?;
                        }
                        scalarizer.scalarize(&Objective::Vector(y))
                    }
                }
            }
        }
    }

    /// Share the new record with peers: fire-and-forget in asynchronous
    /// mode, batched collective exchange in synchronous mode.
    fn propagate(&mut self, record: &EvalRecord) -> HvResult<()> {
        if self.config.sync_communication {
            // Flush whenever at least `freq` records have accumulated, so a
            // burst of concurrent receipts can never skip a flush boundary.
            if self.history.unflushed() >= self.config.sync_communication_freq {
                let unflushed = self.history.unflushed();
                let (points, objectives, infos) = self.history.infos(Some(unflushed))?;
                let peer_batches = self.comm.broadcast(RecordBatch {
                    points,
                    objectives,
                    infos,
                })?;
                let received: usize = peer_batches.iter().map(|b| b.len()).sum();
                debug!(rank = self.comm.rank(), received, "ingesting broadcast batches");
                for batch in peer_batches {
                    self.history
                        .extend(batch.points, batch.objectives, &batch.infos)?;
                }
                self.history.reset_buffer();
            }
        } else {
            self.comm.send_all(record)?;
            self.history.reset_buffer();
        }
        Ok(())
    }

    /// Append drained peer records to the history. The termination sentinel
    /// never appends; it only flips the stop flag.
    fn ingest(&mut self, drained: Drained) -> HvResult<()> {
        if drained.saw_termination {
            self.peer_terminated = true;
        }
        for record in drained.records {
            // A profiled peer record can arrive before this rank's own first
            // profiled evaluation; adopt the timestamp keys on first sight.
            if record.info.len() == PROFILED_INFO_LEN
                && self.history.info_keys().len() < PROFILED_INFO_LEN
            {
                self.history
                    .append_info_keys(&[KEY_TIMESTAMP_START, KEY_TIMESTAMP_END]);
            }
            self.history
                .append(record.point, record.objective, record.info)?;
        }
        Ok(())
    }

    /// Arm the one-shot cooperative timer. Firing is idempotent; a late fire
    /// after the loop stopped is ignored by construction.
    fn arm_timeout(&self, timeout: Duration) -> HvResult<()> {
        if timeout.is_zero() {
            return Err(config_error!("'timeout' should be > 0"));
        }
        let token = Arc::clone(&self.cancel);
        let rank = self.comm.rank();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            if !token.swap(true, Ordering::Relaxed) {
                warn!(rank, "search timeout elapsed");
            }
        });
        Ok(())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hv_comm::ChannelCommunicator;
    use tempfile::TempDir;

    fn space() -> SearchSpace {
        SearchSpace::new().add_float("x", 0.0, 1.0)
    }

    fn config(dir: &TempDir) -> SearchConfig {
        SearchConfig::new()
            .with_random_state(42)
            .with_log_dir(dir.path())
    }

    fn run_fn(params: &HashMap<String, Value>) -> HvResult<RunOutput> {
        Ok(RunOutput::Objective(Objective::Scalar(
            params["x"].as_f64(),
        )))
    }

    #[test]
    fn rank_seeds_are_deterministic_and_distinct() {
        let a = derive_rank_seeds(Some(42), 4);
        let b = derive_rank_seeds(Some(42), 4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_ne!(a[0], a[1]);
        assert_ne!(derive_rank_seeds(Some(43), 4), a);
    }

    #[test]
    fn zero_timeout_is_a_configuration_error_before_any_evaluation() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut evals = 0usize;
        let mut coordinator = SearchCoordinator::new(
            space(),
            |params: &HashMap<String, Value>| {
                evals += 1;
                run_fn(params)
            },
            config(&dir),
            comm,
        )
        .unwrap();
        let err = coordinator
            .search(5, Some(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, hv_types::HvError::Config(_)));
        drop(coordinator);
        assert_eq!(evals, 0);
    }

    #[test]
    fn state_is_terminal_after_search() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut coordinator =
            SearchCoordinator::new(space(), run_fn, config(&dir), comm).unwrap();
        assert_eq!(coordinator.state(), SearchState::Running);
        coordinator.search(3, None).unwrap();
        assert_eq!(coordinator.state(), SearchState::Stopped);
    }

    #[test]
    fn evaluation_failure_is_fatal_but_keeps_partial_history() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut calls = 0usize;
        let mut coordinator = SearchCoordinator::new(
            space(),
            move |params: &HashMap<String, Value>| {
                calls += 1;
                if calls >= 3 {
                    Err(hv_types::HvError::Eval("backend unavailable".into()))
                } else {
                    run_fn(params)
                }
            },
            config(&dir),
            comm,
        )
        .unwrap();
        let err = coordinator.search(10, None).unwrap_err();
        assert!(matches!(err, hv_types::HvError::Eval(_)));
        assert_eq!(coordinator.history().len(), 2);
    }

    #[test]
    fn vector_objective_with_wrong_arity_is_a_shape_error() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut coordinator = SearchCoordinator::new(
            space(),
            |_params: &HashMap<String, Value>| {
                Ok(RunOutput::Objective(Objective::Vector(vec![1.0, 2.0])))
            },
            config(&dir),
            comm,
        )
        .unwrap();
        let err = coordinator.search(3, None).unwrap_err();
        assert!(matches!(err, hv_types::HvError::Shape(_)));
    }

    #[test]
    fn profiled_output_extends_schema_once_and_rebases_timestamps() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut coordinator = SearchCoordinator::new(
            space(),
            |params: &HashMap<String, Value>| {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs_f64();
                Ok(RunOutput::Profiled {
                    objective: Objective::Scalar(params["x"].as_f64()),
                    timestamp_start: now,
                    timestamp_end: now + 0.001,
                })
            },
            config(&dir),
            comm,
        )
        .unwrap();
        let table = coordinator.search(3, None).unwrap().unwrap();
        assert_eq!(
            coordinator.history().info_keys(),
            &[KEY_WORKER_RANK, KEY_TIMESTAMP_START, KEY_TIMESTAMP_END]
        );
        let starts = table.column(KEY_TIMESTAMP_START).unwrap();
        for start in starts {
            // Re-based to the coordinator's start time: small and non-negative.
            assert!(start.as_f64() >= 0.0 && start.as_f64() < 60.0);
        }
    }

    #[test]
    fn run_that_profiles_only_later_evaluations_still_aggregates() {
        let dir = TempDir::new().unwrap();
        let comm = ChannelCommunicator::mesh(1).pop().unwrap();
        let mut calls = 0usize;
        let mut coordinator = SearchCoordinator::new(
            space(),
            move |params: &HashMap<String, Value>| {
                calls += 1;
                if calls == 1 {
                    return run_fn(params);
                }
                let now = unix_now();
                Ok(RunOutput::Profiled {
                    objective: Objective::Scalar(params["x"].as_f64()),
                    timestamp_start: now,
                    timestamp_end: now + 0.001,
                })
            },
            config(&dir),
            comm,
        )
        .unwrap();

        // The schema grows after the first record; aggregation must still
        // produce the full table, with NaN timestamps for the pre-growth row.
        let table = coordinator.search(2, None).unwrap().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.headers(),
            &[
                "x",
                "objective",
                KEY_WORKER_RANK,
                KEY_TIMESTAMP_START,
                KEY_TIMESTAMP_END
            ]
        );
        let starts = table.column(KEY_TIMESTAMP_START).unwrap();
        assert!(starts[0].as_f64().is_nan());
        assert!(starts[1].as_f64() >= 0.0);
    }
}
