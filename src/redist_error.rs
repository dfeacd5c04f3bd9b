//! RedistError: Unified error type for block-redist public APIs
//!
//! Every failure the engine can detect is reported through this enum. None of
//! them are retried: a caller that receives an error is expected to stop the
//! worker, since each variant means either a broken configuration, a broken
//! channel, or corrupted data.

use thiserror::Error;

/// Unified error type for decomposition and redistribution operations.
#[derive(Debug, Error)]
pub enum RedistError {
    /// Dimension is zero or does not match the bounds it is used with.
    #[error("Invalid dimension: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// A decomposition was requested with zero blocks.
    #[error("Block count must be at least 1")]
    NoBlocks,
    /// The global domain has an empty extent along some axis.
    #[error("Domain is empty along axis {axis}: [{min}, {max}]")]
    EmptyDomain { axis: usize, min: i64, max: i64 },
    /// Explicit divisions do not multiply to the requested block count.
    #[error("Divisions {divisions:?} do not multiply to {nblocks} blocks")]
    BadDivisions { divisions: Vec<usize>, nblocks: usize },
    /// A block id outside `0..nblocks` was queried.
    #[error("Block id {gid} out of range for a decomposition of {nblocks} blocks")]
    BlockOutOfRange { gid: usize, nblocks: usize },
    /// The decomposition does not tile the domain exactly.
    #[error("Partition violation: {0}")]
    PartitionViolation(String),
    /// The per-block tag would exceed `CommTag::MAX_TAG`.
    #[error("Tag overflow: base {base:#06x} + block {gid} exceeds the tag space")]
    TagOverflow { base: u16, gid: usize },
    /// A send or receive failed at the channel level.
    #[error("Communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A fragment arrived with a byte length other than the one derived from overlap.
    #[error("Fragment from block {source_gid} to block {target_gid}: {detail}")]
    FragmentLength {
        source_gid: usize,
        target_gid: usize,
        detail: String,
    },
    /// A received grid value differs from the value the generation rule predicts.
    #[error(
        "Grid mismatch in block {gid}: local index {index} holds {found}, expected {expected}"
    )]
    GridMismatch {
        gid: usize,
        index: usize,
        found: u64,
        expected: u64,
    },
    /// The fragments received for a block do not cover its bounds exactly.
    #[error("Block {gid} received {received} grid values, expected {expected}")]
    GridCount {
        gid: usize,
        received: usize,
        expected: usize,
    },
    /// A received point carries a global index outside the block's range.
    #[error("Block {gid}: point {position} has index {index}, outside [{start}, {end})")]
    PointOutOfRange {
        gid: usize,
        position: usize,
        index: u64,
        start: u64,
        end: u64,
    },
    /// A received point index is in range but not where the canonical order puts it.
    #[error("Block {gid}: point {position} has index {index}, expected {expected}")]
    PointOutOfSequence {
        gid: usize,
        position: usize,
        index: u64,
        expected: u64,
    },
    /// The number of received points differs from the block's range size.
    #[error("Block {gid} received {received} points, expected {expected}")]
    PointCount {
        gid: usize,
        received: usize,
        expected: usize,
    },
    /// The readiness sentinel was missing or malformed.
    #[error("Readiness sentinel from rank {rank} was not delivered")]
    MissingSentinel { rank: usize },
    /// A workflow was started with settings it cannot run.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RedistError {
    /// Shorthand for a channel failure with a textual cause.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        RedistError::CommError {
            neighbor,
            source: msg.into().into(),
        }
    }
}
