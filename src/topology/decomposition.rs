//! Regular block decomposition of a global integer domain.
//!
//! A [`RegularDecomposer`] cuts every axis of the domain into `divisions[a]`
//! slabs of `extent / divisions[a]` vertices each; the last slab on an axis
//! absorbs the remainder. Blocks are the cartesian products of slabs, numbered
//! row-major over the division grid (axis 0 outermost). The tiling is exact by
//! construction; [`RegularDecomposer::verify_partition`] re-checks it for tests
//! and strict-invariant builds.

use super::bounds::{Bounds, Coordinate};
use crate::debug_invariants::DebugInvariants;
use crate::redist_error::RedistError;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Geometric partition of a domain into numbered blocks.
///
/// `core_for` is the halo-free box of a block; `bounds_for` additionally carries
/// the ghost margin. Both queries take block ids in `0..nblocks()`.
pub trait Decomposition {
    fn dim(&self) -> usize;
    fn domain(&self) -> &Bounds;
    fn nblocks(&self) -> usize;
    fn core_for(&self, gid: usize) -> Result<Bounds, RedistError>;
    fn bounds_for(&self, gid: usize) -> Result<Bounds, RedistError>;

    /// Ascending ids of the blocks whose **core** intersects `region`.
    /// Every vertex of the domain is in exactly one core, so these are the
    /// owners of the vertices of `region`.
    fn owning_blocks(&self, region: &Bounds) -> Vec<usize>;

    /// Ascending ids of the blocks whose **bounds** intersect `region`.
    fn overlapping_blocks(&self, region: &Bounds) -> Vec<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularDecomposer {
    dim: usize,
    domain: Bounds,
    nblocks: usize,
    divisions: Vec<usize>,
    ghosts: Vec<Coordinate>,
}

impl RegularDecomposer {
    /// Decompose `domain` into `nblocks` blocks, choosing divisions automatically.
    pub fn new(dim: usize, domain: Bounds, nblocks: usize) -> Result<Self, RedistError> {
        Self::with_divisions(dim, domain, nblocks, vec![0; dim])
    }

    /// Decompose with explicit per-axis divisions; a `0` entry is chosen
    /// automatically.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `dim` is zero or disagrees with `domain` or `divisions`.
    /// - `NoBlocks` if `nblocks == 0`.
    /// - `EmptyDomain` if the domain has no vertex along some axis.
    /// - `BadDivisions` if the fixed divisions cannot multiply to `nblocks`.
    pub fn with_divisions(
        dim: usize,
        domain: Bounds,
        nblocks: usize,
        divisions: Vec<usize>,
    ) -> Result<Self, RedistError> {
        if dim == 0 {
            return Err(RedistError::DimensionMismatch { expected: 1, found: 0 });
        }
        domain.check_dim(dim)?;
        if divisions.len() != dim {
            return Err(RedistError::DimensionMismatch {
                expected: dim,
                found: divisions.len(),
            });
        }
        if nblocks == 0 {
            return Err(RedistError::NoBlocks);
        }
        for axis in 0..dim {
            if domain.extent(axis) == 0 {
                return Err(RedistError::EmptyDomain {
                    axis,
                    min: domain.min[axis],
                    max: domain.max[axis],
                });
            }
        }
        let divisions = fill_divisions(&domain, nblocks, divisions)?;
        for axis in 0..dim {
            if (divisions[axis] as u64) > domain.extent(axis) {
                log::warn!(
                    "axis {axis}: {} divisions over {} vertices leaves empty blocks",
                    divisions[axis],
                    domain.extent(axis)
                );
            }
        }
        let dec = Self {
            dim,
            domain,
            nblocks,
            divisions,
            ghosts: vec![0; dim],
        };
        crate::debug_invariants!(dec.validate_invariants(), "RegularDecomposer");
        Ok(dec)
    }

    /// Grow every block's `bounds` by `ghosts[a]` vertices per side (clamped to
    /// the domain). Cores are unaffected.
    pub fn with_ghosts(mut self, ghosts: &[Coordinate]) -> Self {
        for (a, g) in self.ghosts.iter_mut().enumerate() {
            *g = ghosts.get(a).copied().unwrap_or(0).max(0);
        }
        self
    }

    pub fn divisions(&self) -> &[usize] {
        &self.divisions
    }

    pub fn ghosts(&self) -> &[Coordinate] {
        &self.ghosts
    }

    /// Position of a block in the division grid.
    pub fn gid_to_coords(&self, gid: usize) -> Vec<usize> {
        let mut coords = vec![0; self.dim];
        let mut rest = gid;
        for a in (0..self.dim).rev() {
            coords[a] = rest % self.divisions[a];
            rest /= self.divisions[a];
        }
        coords
    }

    pub fn coords_to_gid(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(&self.divisions)
            .fold(0, |gid, (c, d)| gid * d + c)
    }

    /// Vertices per slab along `axis`, before the remainder.
    #[inline]
    fn step(&self, axis: usize) -> Coordinate {
        (self.domain.extent(axis) / self.divisions[axis] as u64) as Coordinate
    }

    /// Inclusive `[lo, hi]` of slab `c` along `axis`; empty when `hi < lo`.
    fn slab(&self, axis: usize, c: usize) -> (Coordinate, Coordinate) {
        let step = self.step(axis);
        let lo = self.domain.min[axis] + c as Coordinate * step;
        if c + 1 == self.divisions[axis] {
            (lo, self.domain.max[axis])
        } else {
            (lo, lo + step - 1)
        }
    }

    /// Slab holding coordinate `x` (which must lie in the domain) along `axis`.
    fn slab_of(&self, axis: usize, x: Coordinate) -> usize {
        let step = self.step(axis);
        let last = self.divisions[axis] - 1;
        if step == 0 {
            return last;
        }
        (((x - self.domain.min[axis]) / step) as usize).min(last)
    }

    /// Per-axis slab ranges touched by `region` (clipped to the domain).
    fn slab_ranges(&self, region: &Bounds) -> Option<Vec<std::ops::RangeInclusive<usize>>> {
        if region.dim() != self.dim {
            return None;
        }
        let clipped = region.intersect(&self.domain);
        if clipped.is_empty() {
            return None;
        }
        Some(
            (0..self.dim)
                .map(|a| self.slab_of(a, clipped.min[a])..=self.slab_of(a, clipped.max[a]))
                .collect(),
        )
    }

    fn block_ids_in(&self, ranges: Vec<std::ops::RangeInclusive<usize>>) -> Vec<usize> {
        let mut gids: Vec<usize> = ranges
            .into_iter()
            .multi_cartesian_product()
            .map(|coords| self.coords_to_gid(&coords))
            .collect();
        gids.sort_unstable();
        gids
    }

    /// Full block table `gid -> core`, in ascending block order.
    pub fn decompose(&self) -> BTreeMap<usize, Bounds> {
        (0..self.nblocks)
            .map(|gid| (gid, self.core_unchecked(gid)))
            .collect()
    }

    fn core_unchecked(&self, gid: usize) -> Bounds {
        let coords = self.gid_to_coords(gid);
        let (min, max) = (0..self.dim).map(|a| self.slab(a, coords[a])).unzip();
        Bounds { min, max }
    }

    fn check_gid(&self, gid: usize) -> Result<(), RedistError> {
        if gid >= self.nblocks {
            return Err(RedistError::BlockOutOfRange {
                gid,
                nblocks: self.nblocks,
            });
        }
        Ok(())
    }

    /// Confirm the cores tile the domain: vertex counts add up and no two
    /// non-empty cores intersect.
    pub fn verify_partition(&self) -> Result<(), RedistError> {
        let cores = self.decompose();
        let total: u64 = cores.values().map(Bounds::num_vertices).sum();
        if total != self.domain.num_vertices() {
            return Err(RedistError::PartitionViolation(format!(
                "cores hold {total} vertices, domain {} holds {}",
                self.domain,
                self.domain.num_vertices()
            )));
        }
        for ((ga, a), (gb, b)) in cores.iter().filter(|(_, c)| !c.is_empty()).tuple_combinations() {
            if a.intersects(b) {
                return Err(RedistError::PartitionViolation(format!(
                    "blocks {ga} {a} and {gb} {b} overlap"
                )));
            }
        }
        for c in cores.values().filter(|c| !c.is_empty()) {
            if c.intersect(&self.domain) != *c {
                return Err(RedistError::PartitionViolation(format!(
                    "core {c} leaves domain {}",
                    self.domain
                )));
            }
        }
        Ok(())
    }
}

impl Decomposition for RegularDecomposer {
    fn dim(&self) -> usize {
        self.dim
    }

    fn domain(&self) -> &Bounds {
        &self.domain
    }

    fn nblocks(&self) -> usize {
        self.nblocks
    }

    fn core_for(&self, gid: usize) -> Result<Bounds, RedistError> {
        self.check_gid(gid)?;
        Ok(self.core_unchecked(gid))
    }

    fn bounds_for(&self, gid: usize) -> Result<Bounds, RedistError> {
        let core = self.core_for(gid)?;
        if core.is_empty() {
            return Ok(core);
        }
        Ok(core.grown_within(&self.ghosts, &self.domain))
    }

    fn owning_blocks(&self, region: &Bounds) -> Vec<usize> {
        match self.slab_ranges(region) {
            Some(ranges) => self.block_ids_in(ranges),
            None => Vec::new(),
        }
    }

    fn overlapping_blocks(&self, region: &Bounds) -> Vec<usize> {
        if self.ghosts.iter().all(|&g| g == 0) {
            return self.owning_blocks(region);
        }
        if region.dim() != self.dim {
            return Vec::new();
        }
        // A block's bounds reach at most `ghost` past its core.
        let reach = region.grown_within(&self.ghosts, &self.domain);
        self.owning_blocks(&reach)
            .into_iter()
            .filter(|&gid| {
                self.bounds_for(gid)
                    .map(|b| b.intersects(region))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl DebugInvariants for RegularDecomposer {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RegularDecomposer");
    }

    fn validate_invariants(&self) -> Result<(), RedistError> {
        let product: usize = self.divisions.iter().product();
        if product != self.nblocks {
            return Err(RedistError::BadDivisions {
                divisions: self.divisions.clone(),
                nblocks: self.nblocks,
            });
        }
        self.verify_partition()
    }
}

/// `decompose(domain, dim, nblocks)`: block id to core bounds.
pub fn decompose(
    domain: &Bounds,
    dim: usize,
    nblocks: usize,
) -> Result<BTreeMap<usize, Bounds>, RedistError> {
    Ok(RegularDecomposer::new(dim, domain.clone(), nblocks)?.decompose())
}

/// Complete `divisions` so that their product is `nblocks`.
///
/// The free part of `nblocks` is factored into primes; each factor, largest
/// first, multiplies the free axis with the most vertices per division
/// (lowest axis on ties).
pub fn fill_divisions(
    domain: &Bounds,
    nblocks: usize,
    mut divisions: Vec<usize>,
) -> Result<Vec<usize>, RedistError> {
    let bad = |divisions: &[usize]| RedistError::BadDivisions {
        divisions: divisions.to_vec(),
        nblocks,
    };
    let fixed: usize = divisions.iter().filter(|&&d| d != 0).product();
    if fixed == 0 || nblocks % fixed != 0 {
        return Err(bad(&divisions));
    }
    let free: Vec<usize> = (0..divisions.len()).filter(|&a| divisions[a] == 0).collect();
    let mut rest = nblocks / fixed;
    if free.is_empty() {
        return if rest == 1 { Ok(divisions) } else { Err(bad(&divisions)) };
    }
    for &a in &free {
        divisions[a] = 1;
    }
    for factor in prime_factors(rest).into_iter().rev() {
        let axis = free
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let ra = domain.extent(a) as f64 / divisions[a] as f64;
                let rb = domain.extent(b) as f64 / divisions[b] as f64;
                // `max_by` keeps the last maximum; reverse the axis order for ties.
                ra.total_cmp(&rb).then(b.cmp(&a))
            })
            .ok_or_else(|| bad(&divisions))?;
        divisions[axis] *= factor;
        rest /= factor;
    }
    debug_assert_eq!(rest, 1);
    Ok(divisions)
}

/// Prime factors in ascending order, with multiplicity.
fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            out.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        out.push(n);
    }
    out
}
