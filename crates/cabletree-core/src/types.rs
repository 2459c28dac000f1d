//! Identifier and spike types shared across the engine

use core::fmt;

/// Globally unique cell identifier; the gid space is dense and partitioned
/// contiguously across ranks.
pub type CellGid = u64;

/// Index of an item (detector, synapse, probe) within one cell.
pub type CellLocalIndex = u32;

/// Simulation time in milliseconds.
pub type TimeMs = f64;

/// A point on a specific cell, identified by the owning gid and the index of
/// the item within that cell. Ordering is lexicographic on `(gid, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellMember {
    /// Owning cell gid
    pub gid: CellGid,
    /// Index within the cell
    pub index: CellLocalIndex,
}

impl CellMember {
    /// Create a new cell member reference
    pub const fn new(gid: CellGid, index: CellLocalIndex) -> Self {
        Self { gid, index }
    }
}

impl fmt::Display for CellMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.gid, self.index)
    }
}

/// A threshold crossing emitted by a spike detector.
///
/// Immutable once emitted; `time` is the interpolated crossing time in ms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    /// The detector that crossed threshold
    pub source: CellMember,
    /// Crossing time (ms)
    pub time: TimeMs,
}

impl Spike {
    /// Create a new spike
    pub const fn new(source: CellMember, time: TimeMs) -> Self {
        Self { source, time }
    }
}
