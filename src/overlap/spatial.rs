//! Spatial overlap for the grid payload.
//!
//! Vertices are owned by block cores. A fragment therefore always runs from a
//! source **core** to a destination **bounds** (which may include ghosts):
//! - the sender lists the peer blocks whose bounds touch its core,
//! - the receiver lists the peer blocks whose cores touch its bounds.
//!
//! Both sides then walk the shared `int_bounds` with [`GridShape`], so the
//! k-th value in a fragment is the k-th vertex of `int_bounds` on both ends.

use crate::redist_error::RedistError;
use crate::topology::bounds::Bounds;
use crate::topology::decomposition::Decomposition;
use crate::topology::grid::GridShape;

/// A non-empty box shared between a local block and one peer block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFragment {
    pub peer: usize,
    pub int_bounds: Bounds,
}

impl GridFragment {
    /// Number of grid values carried by this fragment.
    pub fn len(&self) -> usize {
        self.int_bounds.num_vertices() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.int_bounds.is_empty()
    }
}

/// Fragments a producer block sends: its `core` cut against the bounds of every
/// peer block it touches, in ascending peer order.
pub fn outgoing_fragments<D>(core: &Bounds, peer: &D) -> Result<Vec<GridFragment>, RedistError>
where
    D: Decomposition + ?Sized,
{
    core.check_dim(peer.dim())?;
    let mut out = Vec::new();
    for gid in peer.overlapping_blocks(core) {
        let int_bounds = core.intersect(&peer.bounds_for(gid)?);
        if int_bounds.is_empty() {
            continue;
        }
        out.push(GridFragment { peer: gid, int_bounds });
    }
    Ok(out)
}

/// Fragments a consumer block receives: its `bounds` cut against the core of
/// every peer block that owns part of it, in ascending peer order.
pub fn incoming_fragments<D>(bounds: &Bounds, peer: &D) -> Result<Vec<GridFragment>, RedistError>
where
    D: Decomposition + ?Sized,
{
    bounds.check_dim(peer.dim())?;
    let mut out = Vec::new();
    for gid in peer.owning_blocks(bounds) {
        let int_bounds = bounds.intersect(&peer.core_for(gid)?);
        if int_bounds.is_empty() {
            continue;
        }
        out.push(GridFragment { peer: gid, int_bounds });
    }
    Ok(out)
}

/// Positions, within a grid laid over `local`, of the vertices of `int_bounds`
/// in canonical order. `int_bounds` must lie inside `local`.
///
/// This is the only ordering used to encode and decode grid fragments.
pub fn local_indices<'a>(
    local: &'a GridShape,
    int_bounds: &Bounds,
) -> impl Iterator<Item = usize> + 'a {
    let walk = GridShape::new(int_bounds);
    // Collected so the iterator does not borrow the temporary shape.
    let vertices: Vec<_> = walk.vertices().collect();
    vertices.into_iter().map(move |v| local.index(&v) as usize)
}

/// Copy the values of `int_bounds` out of `grid` (laid over `local`).
pub fn gather(grid: &[u64], local: &Bounds, int_bounds: &Bounds) -> Vec<u64> {
    let shape = GridShape::new(local);
    local_indices(&shape, int_bounds).map(|i| grid[i]).collect()
}

/// Write `values` into the `int_bounds` part of `grid` (laid over `local`).
/// Returns how many values were written.
pub fn scatter<I>(grid: &mut [u64], local: &Bounds, int_bounds: &Bounds, values: I) -> usize
where
    I: IntoIterator<Item = u64>,
{
    let shape = GridShape::new(local);
    let mut written = 0;
    for (i, v) in local_indices(&shape, int_bounds).zip(values) {
        grid[i] = v;
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::decomposition::RegularDecomposer;

    fn line(lo: i64, hi: i64) -> Bounds {
        Bounds::new(vec![lo], vec![hi]).unwrap()
    }

    #[test]
    fn producer_block_splits_over_consumers() {
        let cons = RegularDecomposer::new(1, line(0, 1023), 3).unwrap();
        let frags = outgoing_fragments(&line(256, 511), &cons).unwrap();
        assert_eq!(
            frags,
            vec![
                GridFragment { peer: 0, int_bounds: line(256, 340) },
                GridFragment { peer: 1, int_bounds: line(341, 511) },
            ]
        );
    }

    #[test]
    fn consumer_block_collects_from_producers() {
        let prod = RegularDecomposer::new(1, line(0, 1023), 4).unwrap();
        let frags = incoming_fragments(&line(0, 340), &prod).unwrap();
        let lens: Vec<_> = frags.iter().map(GridFragment::len).collect();
        assert_eq!(frags[0].peer, 0);
        assert_eq!(frags[1].peer, 1);
        assert_eq!(lens, vec![256, 85]);
    }

    #[test]
    fn gather_then_scatter_in_two_dims() {
        let local = Bounds::new(vec![2, 3], vec![5, 6]).unwrap();
        let grid: Vec<u64> = (0..16).collect();
        let int_bounds = Bounds::new(vec![3, 5], vec![4, 6]).unwrap();
        let vals = gather(&grid, &local, &int_bounds);
        // rows 1..=2, columns 2..=3 of a 4x4 grid
        assert_eq!(vals, vec![6, 7, 10, 11]);

        let mut out = vec![0u64; 16];
        assert_eq!(scatter(&mut out, &local, &int_bounds, vals), 4);
        assert_eq!(out[6], 6);
        assert_eq!(out[11], 11);
        assert_eq!(out.iter().filter(|&&v| v != 0).count(), 4);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let cons = RegularDecomposer::new(1, line(0, 9), 2).unwrap();
        let sq = Bounds::from_extents(&[3, 3]).unwrap();
        assert!(outgoing_fragments(&sq, &cons).is_err());
    }
}
