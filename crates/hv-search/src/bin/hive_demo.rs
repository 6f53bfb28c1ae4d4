//! Small runnable demo: three workers jointly maximize a smooth 2-D
//! function over an in-process channel mesh.
//!
//! Run with `RUST_LOG=info cargo run --bin hive-demo`.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use hv_comm::ChannelCommunicator;
use hv_search::{ResultTable, SearchConfig, SearchCoordinator, SurrogateKind};
use hv_types::{HvResult, Objective, RunOutput, SearchSpace, Value};

const WORKERS: usize = 3;
const MAX_EVALS: i64 = 90;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let space = SearchSpace::new()
        .add_float("x", -1.0, 1.0)
        .add_float("y", -1.0, 1.0);

    let comms = ChannelCommunicator::mesh(WORKERS);

    let outcomes: Vec<HvResult<Option<ResultTable>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let space = space.clone();
                scope.spawn(move || -> HvResult<Option<ResultTable>> {
                    let config = SearchConfig::new()
                        .with_random_state(2024)
                        .with_log_dir("hive-demo-results")
                        .with_surrogate_model(SurrogateKind::Perturb)
                        .with_n_initial_points(10);
                    let mut coordinator = SearchCoordinator::new(
                        space,
                        |params: &HashMap<String, Value>| {
                            let x = params["x"].as_f64();
                            let y = params["y"].as_f64();
                            // Single peak at (0.3, -0.5).
                            Ok(RunOutput::Objective(Objective::Scalar(
                                -(x - 0.3).powi(2) - (y + 0.5).powi(2),
                            )))
                        },
                        config,
                        comm,
                    )?;
                    coordinator.search(MAX_EVALS, Some(Duration::from_secs(30)))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread panicked"))
            .collect()
    });

    for outcome in outcomes {
        if let Some(table) = outcome? {
            println!("evaluations: {}", table.len());
            if let Some(best) = table.best_row() {
                println!("best row: {best:?}");
            }
            println!("results written to hive-demo-results/results.csv");
        }
    }
    Ok(())
}
