// src/exec/operation.rs

use crate::types::BufferUse;

/// One unit of work in an operation sequence.
///
/// `P` is the per-invocation parameter type; the executor forwards it
/// unchanged to every operation. Operations must be shareable across threads
/// because independent nodes may run concurrently.
pub trait Operation<P: ?Sized>: Send + Sync {
    /// Human-readable name used in diagnostics and errors.
    fn name(&self) -> &str;

    /// Buffers this operation reads and writes.
    ///
    /// `None` means the use information is unknown, which makes the operation
    /// unusable for graph construction.
    fn buffer_uses(&self) -> Option<&[BufferUse]>;

    /// Run the operation.
    fn execute(&self, params: &P) -> anyhow::Result<()>;
}
