// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Load a plan file from a given path and return the raw `RawPlanFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let plan: RawPlanFile = toml::from_str(&contents)?;
    Ok(plan)
}

/// Load a plan file from path and validate it.
///
/// Buffer-use completeness is checked later, when the dependency graph is
/// built from the operations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    PlanFile::try_from(raw)
}

/// `Opgraph.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Opgraph.toml")
}
