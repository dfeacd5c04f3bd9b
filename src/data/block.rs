//! One block of a decomposition and its payloads.
//!
//! A block is created once per `(decomposition, gid)`. On the producer side the
//! payloads are written once at creation and only read afterwards; on the
//! consumer side incoming fragments accumulate into `recv_grid`/`recv_points`
//! and are validated once the last fragment has arrived.

use super::generator::PayloadGenerator;
use super::points::PointSet;
use crate::debug_invariants::DebugInvariants;
use crate::overlap::range::PointRange;
use crate::redist_error::RedistError;
use crate::topology::bounds::Bounds;
use crate::topology::grid::GridShape;

/// Where a block is in its redistribution round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Idle,
    /// Producer: cutting fragments.
    Staging,
    /// Producer: sends issued, handles outstanding.
    Sending,
    /// Consumer: fragments arriving.
    Receiving,
    /// Consumer: comparing against the generation rule.
    Validating,
    Done,
}

/// An issued send. The handle owns the encoded fragment until it is waited on.
#[derive(Debug)]
pub struct PendingSend<S> {
    /// Destination rank.
    pub peer: usize,
    pub tag: u16,
    pub bytes: usize,
    pub handle: S,
}

/// A block: its boxes, its payloads, and the sends still in flight.
///
/// `S` is the send-handle type of the communicator the block talks through.
#[derive(Debug)]
pub struct Block<S = ()> {
    pub gid: usize,
    /// Halo-free box; the vertices this block owns.
    pub core: Bounds,
    /// `core` plus the ghost margin; the grid is laid over this box.
    pub bounds: Bounds,
    pub domain: Bounds,
    /// One value per vertex of `bounds`, canonical order.
    pub grid: Vec<u64>,
    /// Global indices of `points`.
    pub point_range: PointRange,
    pub points: PointSet,
    /// Values received for the vertices of `bounds`.
    pub recv_grid: Vec<u64>,
    /// Points received for this block's range of the peer layout.
    pub recv_points: PointSet,
    pub state: BlockState,
    pub(crate) pending: Vec<PendingSend<S>>,
}

impl<S> Block<S> {
    /// An empty block; no payload is allocated until [`Block::generate`].
    pub fn new(gid: usize, core: Bounds, bounds: Bounds, domain: Bounds) -> Self {
        let dim = domain.dim();
        Self {
            gid,
            core,
            bounds,
            domain,
            grid: Vec::new(),
            point_range: PointRange::new(0, 0),
            points: PointSet::new(dim),
            recv_grid: Vec::new(),
            recv_points: PointSet::new(dim),
            state: BlockState::Idle,
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.domain.dim()
    }

    /// Canonical index space over `bounds`.
    pub fn shape(&self) -> GridShape {
        GridShape::new(&self.bounds)
    }

    /// Fill the grid over `bounds` and the points of `range`.
    pub fn generate<G>(&mut self, generator: &G, range: PointRange)
    where
        G: PayloadGenerator + ?Sized,
    {
        let domain = GridShape::new(&self.domain);
        let local = self.shape();
        self.grid = fill_grid(generator, &domain, &local);

        self.point_range = range;
        self.points = PointSet::with_capacity(self.dim(), range.len() as usize);
        let mut p = vec![0.0; self.dim()];
        for index in range.start..range.end {
            generator.fill_point(index, &mut p);
            self.points.push(&p);
        }
        if range.is_empty() {
            log::warn!("block {} generated no points", self.gid);
        }
    }

    /// Sends issued by this block and not yet waited on.
    pub fn pending(&self) -> &[PendingSend<S>] {
        &self.pending
    }

    pub(crate) fn push_pending(&mut self, send: PendingSend<S>) {
        self.pending.push(send);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingSend<S>> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(not(feature = "rayon"))]
fn fill_grid<G>(generator: &G, domain: &GridShape, local: &GridShape) -> Vec<u64>
where
    G: PayloadGenerator + ?Sized,
{
    local
        .vertices()
        .map(|v| generator.grid_value(domain, &v))
        .collect()
}

#[cfg(feature = "rayon")]
fn fill_grid<G>(generator: &G, domain: &GridShape, local: &GridShape) -> Vec<u64>
where
    G: PayloadGenerator + ?Sized,
{
    use rayon::prelude::*;
    (0..local.size())
        .into_par_iter()
        .map(|i| generator.grid_value(domain, &local.vertex(i)))
        .collect()
}

impl<S> DebugInvariants for Block<S> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Block");
    }

    fn validate_invariants(&self) -> Result<(), RedistError> {
        self.core.check_dim(self.dim())?;
        self.bounds.check_dim(self.dim())?;
        if !self.core.is_empty() && self.bounds.intersect(&self.core) != self.core {
            return Err(RedistError::PartitionViolation(format!(
                "block {}: core {} not inside bounds {}",
                self.gid, self.core, self.bounds
            )));
        }
        if self.bounds.intersect(&self.domain) != self.bounds && !self.bounds.is_empty() {
            return Err(RedistError::PartitionViolation(format!(
                "block {}: bounds {} leave the domain {}",
                self.gid, self.bounds, self.domain
            )));
        }
        if !self.grid.is_empty() && self.grid.len() as u64 != self.bounds.num_vertices() {
            return Err(RedistError::GridCount {
                gid: self.gid,
                received: self.grid.len(),
                expected: self.bounds.num_vertices() as usize,
            });
        }
        if self.points.len() as u64 != self.point_range.len() {
            return Err(RedistError::PointCount {
                gid: self.gid,
                received: self.points.len(),
                expected: self.point_range.len() as usize,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generator::CanonicalPayload;

    #[test]
    fn generate_fills_bounds_and_range() {
        let domain = Bounds::from_extents(&[4, 6]).unwrap();
        let core = Bounds::new(vec![2, 3], vec![3, 5]).unwrap();
        let mut b: Block = Block::new(3, core.clone(), core, domain);
        b.generate(&CanonicalPayload, PointRange::new(30, 33));
        assert_eq!(b.grid, vec![15, 16, 17, 21, 22, 23]);
        assert_eq!(b.points.len(), 3);
        assert_eq!(b.points.point(2), &[32.0, 32.0]);
        assert!(b.validate_invariants().is_ok());
    }

    #[test]
    fn empty_core_generates_nothing() {
        let domain = Bounds::from_extents(&[3]).unwrap();
        let core = Bounds::new(vec![0], vec![-1]).unwrap();
        let mut b: Block = Block::new(0, core.clone(), core, domain);
        b.generate(&CanonicalPayload, PointRange::new(0, 0));
        assert!(b.grid.is_empty());
        assert!(b.points.is_empty());
        assert!(b.validate_invariants().is_ok());
    }

    #[test]
    fn core_outside_bounds_is_rejected() {
        let domain = Bounds::from_extents(&[10]).unwrap();
        let core = Bounds::new(vec![0], vec![5]).unwrap();
        let bounds = Bounds::new(vec![0], vec![3]).unwrap();
        let b: Block = Block::new(0, core, bounds, domain);
        assert!(matches!(
            b.validate_invariants(),
            Err(RedistError::PartitionViolation(_))
        ));
    }
}
