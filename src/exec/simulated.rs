// src/exec/simulated.rs

//! Operations described by a plan file.
//!
//! A simulated operation sleeps for its configured duration and then succeeds
//! or fails as configured. Useful for exploring how a buffer layout turns into
//! parallelism without writing any numeric kernels.

use std::time::{Duration, Instant};

use anyhow::bail;
use tracing::{debug, info};

use crate::config::model::OpConfig;
use crate::exec::Operation;
use crate::types::BufferUse;

/// Parameters shared by every operation of one execution.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Zero-based index of the execution (see `--runs`).
    pub run: usize,
    pub started_at: Instant,
}

impl RunParams {
    pub fn new(run: usize) -> Self {
        Self {
            run,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedOperation {
    name: String,
    uses: Option<Vec<BufferUse>>,
    duration: Duration,
    fail: bool,
}

impl SimulatedOperation {
    pub fn from_config(cfg: &OpConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            uses: cfg.buffer_uses(),
            duration: Duration::from_millis(cfg.duration_ms),
            fail: cfg.fail,
        }
    }
}

impl Operation<RunParams> for SimulatedOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer_uses(&self) -> Option<&[BufferUse]> {
        self.uses.as_deref()
    }

    fn execute(&self, params: &RunParams) -> anyhow::Result<()> {
        debug!(op = %self.name, run = params.run, "operation started");

        if !self.duration.is_zero() {
            std::thread::sleep(self.duration);
        }

        if self.fail {
            bail!("simulated failure after {:?}", self.duration);
        }

        info!(
            op = %self.name,
            run = params.run,
            elapsed_ms = params.started_at.elapsed().as_millis() as u64,
            "operation finished"
        );
        Ok(())
    }
}
