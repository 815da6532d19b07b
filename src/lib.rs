// src/lib.rs

//! Dataflow executor for operation sequences.
//!
//! Each operation declares the buffers it reads and writes. From those
//! declarations [`dag::GraphBuilder`] derives an immutable dependency graph
//! (read-after-write, write-after-write and write-after-read hazards), and
//! [`engine::Executor`] runs the graph, either inline or through a pluggable
//! [`exec::Dispatcher`], starting each operation only once all of its
//! dependencies have finished.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::PlanFile;
use crate::config::loader::load_and_validate;
use crate::dag::GraphBuilder;
use crate::engine::Executor;
use crate::exec::{Dispatcher, Operation, RunParams, SimulatedOperation, TokioDispatcher};

pub use crate::errors::{OpGraphError, Result as OpGraphResult};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - graph construction
/// - the Tokio-backed dispatcher (unless running inline)
/// - repeated executions sharing one graph
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let plan = load_and_validate(&config_path)?;

    let reduce = args.transitive_reduction || plan.config.transitive_reduction;
    let executor = build_executor(&plan, reduce)?;

    if args.dot {
        print!("{}", executor.to_dot());
        return Ok(());
    }
    if args.dry_run {
        println!("{executor}");
        return Ok(());
    }

    let workers = args.workers.unwrap_or(plan.config.workers);
    let runtime = if args.inline || workers == 0 {
        None
    } else {
        Some(build_runtime(workers)?)
    };
    let dispatcher = runtime.as_ref().map(|rt| {
        Arc::new(TokioDispatcher::new(rt.handle().clone())) as Arc<dyn Dispatcher>
    });
    info!(workers, inline = dispatcher.is_none(), runs = args.runs, "starting execution");

    for run in 0..args.runs {
        let started = Instant::now();
        executor.execute(Arc::new(RunParams::new(run)), dispatcher.clone())?;
        info!(
            run,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
    }

    Ok(())
}

/// Turn a validated plan into an executor over simulated operations.
pub fn build_executor(plan: &PlanFile, transitive_reduction: bool) -> OpGraphResult<Executor<RunParams>> {
    let operations: Vec<Box<dyn Operation<RunParams>>> = plan
        .op
        .iter()
        .map(|op| Box::new(SimulatedOperation::from_config(op)) as Box<dyn Operation<RunParams>>)
        .collect();

    let builder = GraphBuilder::new().transitive_reduction(transitive_reduction);
    Executor::with_builder(operations, builder)
}

/// Runtime whose blocking pool provides `workers` threads for operations.
fn build_runtime(workers: usize) -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(workers)
        .thread_name("opgraph-worker")
        .build()?;
    Ok(runtime)
}
