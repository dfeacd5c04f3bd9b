//! Numeric-range overlap for the point payload.
//!
//! Points are addressed by global index rather than position. A
//! [`PointLayout`] gives every block of a decomposition the half-open range
//! `[gid * nominal, (gid + 1) * nominal)` with `nominal = global / nblocks`; the
//! last block runs to `global`. Two layouts over the same global count are
//! intersected as integer intervals.

use crate::redist_error::RedistError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open range of global point indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointRange {
    pub start: u64,
    pub end: u64,
}

impl PointRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    pub fn intersect(&self, other: &PointRange) -> PointRange {
        PointRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }
}

/// Assignment of `global` point indices to `nblocks` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointLayout {
    global: u64,
    nblocks: usize,
}

impl PointLayout {
    pub fn new(global: u64, nblocks: usize) -> Result<Self, RedistError> {
        if nblocks == 0 {
            return Err(RedistError::NoBlocks);
        }
        if global < nblocks as u64 {
            log::warn!("{global} points over {nblocks} blocks: all points land in the last block");
        }
        Ok(Self { global, nblocks })
    }

    pub fn global(&self) -> u64 {
        self.global
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    /// Points per block, excluding the remainder held by the last block.
    #[inline]
    pub fn nominal(&self) -> u64 {
        self.global / self.nblocks as u64
    }

    /// Range owned by block `gid`.
    pub fn range(&self, gid: usize) -> Result<PointRange, RedistError> {
        if gid >= self.nblocks {
            return Err(RedistError::BlockOutOfRange {
                gid,
                nblocks: self.nblocks,
            });
        }
        let start = gid as u64 * self.nominal();
        let end = if gid + 1 == self.nblocks {
            self.global
        } else {
            start + self.nominal()
        };
        Ok(PointRange { start, end })
    }

    /// Ascending ids of the blocks whose ranges intersect `range`.
    pub fn owners(&self, range: PointRange) -> Range<usize> {
        let range = range.intersect(&PointRange::new(0, self.global));
        if range.is_empty() {
            return 0..0;
        }
        let last = self.nblocks - 1;
        let nominal = self.nominal();
        if nominal == 0 {
            return last..last + 1;
        }
        let first = ((range.start / nominal) as usize).min(last);
        let hi = (((range.end - 1) / nominal) as usize).min(last);
        first..hi + 1
    }
}

/// One non-empty intersection between a local block's range and a peer block's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointOverlap {
    pub peer: usize,
    /// Global indices shared with the peer.
    pub range: PointRange,
    /// The same indices as offsets into the local block's points.
    pub local: Range<usize>,
}

impl PointOverlap {
    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

/// Intersections of `own` with every block of `peer`, in ascending peer order.
/// Peers with an empty intersection are not listed.
pub fn point_overlaps(own: PointRange, peer: &PointLayout) -> Result<Vec<PointOverlap>, RedistError> {
    let mut out = Vec::new();
    for gid in peer.owners(own) {
        let range = own.intersect(&peer.range(gid)?);
        if range.is_empty() {
            continue;
        }
        let lo = (range.start - own.start) as usize;
        let hi = (range.end - own.start) as usize;
        out.push(PointOverlap {
            peer: gid,
            range,
            local: lo..hi,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_block_takes_remainder() {
        let l = PointLayout::new(10, 3).unwrap();
        assert_eq!(l.range(0).unwrap(), PointRange::new(0, 3));
        assert_eq!(l.range(1).unwrap(), PointRange::new(3, 6));
        assert_eq!(l.range(2).unwrap(), PointRange::new(6, 10));
        assert!(l.range(3).is_err());
    }

    #[test]
    fn overlaps_between_layouts() {
        let src = PointLayout::new(10, 3).unwrap();
        let dst = PointLayout::new(10, 4).unwrap();
        // dst ranges: [0,2) [2,4) [4,6) [6,10)
        let ov = point_overlaps(src.range(1).unwrap(), &dst).unwrap();
        let peers: Vec<_> = ov.iter().map(|o| o.peer).collect();
        assert_eq!(peers, vec![1, 2]);
        assert_eq!(ov[0].range, PointRange::new(3, 4));
        assert_eq!(ov[0].local, 0..1);
        assert_eq!(ov[1].range, PointRange::new(4, 6));
        assert_eq!(ov[1].local, 1..3);
    }

    #[test]
    fn fewer_points_than_blocks() {
        let dst = PointLayout::new(3, 4).unwrap();
        for gid in 0..3 {
            assert!(dst.range(gid).unwrap().is_empty());
        }
        assert_eq!(dst.range(3).unwrap(), PointRange::new(0, 3));
        let src = PointLayout::new(3, 1).unwrap();
        let ov = point_overlaps(src.range(0).unwrap(), &dst).unwrap();
        assert_eq!(ov.len(), 1);
        assert_eq!(ov[0].peer, 3);
    }

    #[test]
    fn empty_range_has_no_overlaps() {
        let dst = PointLayout::new(100, 7).unwrap();
        assert!(point_overlaps(PointRange::new(5, 5), &dst).unwrap().is_empty());
        assert_eq!(dst.owners(PointRange::new(200, 300)), 0..0);
    }
}
