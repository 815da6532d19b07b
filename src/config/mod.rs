// src/config/mod.rs

//! Plan file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate basic invariants like unique operation names (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, OpConfig, PlanFile, RawPlanFile};
