#![allow(dead_code)]

use opgraph::config::{ConfigSection, OpConfig, PlanFile, RawPlanFile};
use opgraph::types::BufferId;

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                op: Vec::new(),
            },
        }
    }

    pub fn with_op(mut self, op: OpConfig) -> Self {
        self.plan.op.push(op);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.plan.config.workers = workers;
        self
    }

    pub fn transitive_reduction(mut self, val: bool) -> Self {
        self.plan.config.transitive_reduction = val;
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `OpConfig`.
///
/// Starts with empty `reads`/`writes` lists, i.e. complete (empty) buffer-use
/// information. Call `unknown_uses()` to drop both lists.
pub struct OpConfigBuilder {
    op: OpConfig,
}

impl OpConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            op: OpConfig {
                name: name.to_string(),
                reads: Some(vec![]),
                writes: Some(vec![]),
                duration_ms: 0,
                fail: false,
            },
        }
    }

    pub fn reads(mut self, buffer: &str) -> Self {
        self.op.reads.get_or_insert_with(Vec::new).push(BufferId::from(buffer));
        self
    }

    pub fn writes(mut self, buffer: &str) -> Self {
        self.op.writes.get_or_insert_with(Vec::new).push(BufferId::from(buffer));
        self
    }

    pub fn unknown_uses(mut self) -> Self {
        self.op.reads = None;
        self.op.writes = None;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.op.duration_ms = ms;
        self
    }

    pub fn fail(mut self, val: bool) -> Self {
        self.op.fail = val;
        self
    }

    pub fn build(self) -> OpConfig {
        self.op
    }
}
