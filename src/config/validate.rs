// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{OpGraphError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = OpGraphError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.op))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_ops(plan)?;
    validate_op_names(plan)?;
    validate_buffer_names(plan)?;
    Ok(())
}

fn ensure_has_ops(plan: &RawPlanFile) -> Result<()> {
    if plan.op.is_empty() {
        return Err(OpGraphError::ConfigError(
            "plan must contain at least one [[op]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_op_names(plan: &RawPlanFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, op) in plan.op.iter().enumerate() {
        if op.name.trim().is_empty() {
            return Err(OpGraphError::ConfigError(format!(
                "op #{index} has an empty name"
            )));
        }
        if !seen.insert(op.name.as_str()) {
            return Err(OpGraphError::ConfigError(format!(
                "duplicate op name '{}'",
                op.name
            )));
        }
    }
    Ok(())
}

fn validate_buffer_names(plan: &RawPlanFile) -> Result<()> {
    for op in &plan.op {
        let buffers = op.reads.iter().flatten().chain(op.writes.iter().flatten());
        for buffer in buffers {
            if buffer.as_str().trim().is_empty() {
                return Err(OpGraphError::ConfigError(format!(
                    "op '{}' names an empty buffer",
                    op.name
                )));
            }
        }
    }
    Ok(())
}
