// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Node identifier: the position of the operation in its sequence.
pub type NodeId = usize;

/// Name of a memory buffer that operations read from or write to.
///
/// Two operations conflict only if they name the same buffer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct BufferId(String);

impl BufferId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BufferId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BufferId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an operation touches a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryAccess {
    Read,
    Write,
}

/// One declared access of an operation to a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferUse {
    pub buffer: BufferId,
    pub access: MemoryAccess,
}

impl BufferUse {
    pub fn read(buffer: impl Into<BufferId>) -> Self {
        Self {
            buffer: buffer.into(),
            access: MemoryAccess::Read,
        }
    }

    pub fn write(buffer: impl Into<BufferId>) -> Self {
        Self {
            buffer: buffer.into(),
            access: MemoryAccess::Write,
        }
    }
}
