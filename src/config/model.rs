// src/config/model.rs

use serde::Deserialize;

use crate::types::{BufferId, BufferUse};

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// transitive_reduction = false
///
/// [[op]]
/// name = "load"
/// writes = ["x", "y"]
/// duration_ms = 20
///
/// [[op]]
/// name = "scale"
/// reads = ["x"]
/// writes = ["x"]
/// ```
///
/// Operations run in file order; that order defines the dependency graph.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub op: Vec<OpConfig>,
}

/// Validated plan file. Build with `PlanFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub op: Vec<OpConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(config: ConfigSection, op: Vec<OpConfig>) -> Self {
        Self { config, op }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Size of the blocking pool used by the dispatcher.
    ///
    /// `0` runs every operation inline on the main thread.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Drop dependency edges implied by other paths.
    #[serde(default)]
    pub transitive_reduction: bool,
}

fn default_workers() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            transitive_reduction: false,
        }
    }
}

/// One `[[op]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct OpConfig {
    pub name: String,

    /// Buffers read. Omitting both `reads` and `writes` leaves the operation
    /// without buffer-use information, which is rejected at graph build time.
    #[serde(default)]
    pub reads: Option<Vec<BufferId>>,

    #[serde(default)]
    pub writes: Option<Vec<BufferId>>,

    /// Simulated work time.
    #[serde(default)]
    pub duration_ms: u64,

    /// Simulated failure.
    #[serde(default)]
    pub fail: bool,
}

impl OpConfig {
    /// Declared buffer uses, reads first; `None` if neither list was given.
    pub fn buffer_uses(&self) -> Option<Vec<BufferUse>> {
        if self.reads.is_none() && self.writes.is_none() {
            return None;
        }

        let reads = self.reads.iter().flatten().cloned().map(BufferUse::read);
        let writes = self.writes.iter().flatten().cloned().map(BufferUse::write);
        Some(reads.chain(writes).collect())
    }
}
