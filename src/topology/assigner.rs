//! Block-to-rank assignment.

/// Assigns blocks to ranks in contiguous runs: with `nblocks` blocks over
/// `nranks` ranks, the first `nblocks % nranks` ranks hold one extra block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousAssigner {
    nranks: usize,
    nblocks: usize,
}

impl ContiguousAssigner {
    pub fn new(nranks: usize, nblocks: usize) -> Self {
        Self {
            nranks: nranks.max(1),
            nblocks,
        }
    }

    pub fn nranks(&self) -> usize {
        self.nranks
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    /// Rank owning block `gid`.
    pub fn rank(&self, gid: usize) -> usize {
        let div = self.nblocks / self.nranks;
        let rem = self.nblocks % self.nranks;
        let split = rem * (div + 1);
        if gid < split {
            gid / (div + 1)
        } else {
            rem + (gid - split) / div.max(1)
        }
    }

    /// Ascending block ids owned by `rank`.
    pub fn local_gids(&self, rank: usize) -> std::ops::Range<usize> {
        let div = self.nblocks / self.nranks;
        let rem = self.nblocks % self.nranks;
        let start = rank * div + rank.min(rem);
        let len = div + usize::from(rank < rem);
        let start = start.min(self.nblocks);
        start..(start + len).min(self.nblocks)
    }
}
