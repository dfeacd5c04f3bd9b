//! Axis-aligned integer boxes.
//!
//! A [`Bounds`] is a set of grid vertices: `min` and `max` are both inclusive
//! along every axis, so `[0, 1023]` holds 1024 vertices. A box is empty when
//! `min > max` along any axis. Blocks produced by the same decomposition never
//! share a vertex, which is the closed-open convention `[min, max + 1)` written
//! in vertex form.

use crate::redist_error::RedistError;
use serde::{Deserialize, Serialize};

pub type Coordinate = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Corners")]
pub struct Bounds {
    pub min: Vec<Coordinate>,
    pub max: Vec<Coordinate>,
}

/// Unchecked serialized form; goes through [`Bounds::new`].
#[derive(Deserialize)]
struct Corners {
    min: Vec<Coordinate>,
    max: Vec<Coordinate>,
}

impl TryFrom<Corners> for Bounds {
    type Error = RedistError;

    fn try_from(c: Corners) -> Result<Self, Self::Error> {
        Bounds::new(c.min, c.max)
    }
}

impl Bounds {
    /// Build a box from inclusive corners.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` when the corners have different lengths or
    /// are zero-dimensional.
    pub fn new(min: Vec<Coordinate>, max: Vec<Coordinate>) -> Result<Self, RedistError> {
        if min.is_empty() || min.len() != max.len() {
            return Err(RedistError::DimensionMismatch {
                expected: min.len().max(1),
                found: max.len(),
            });
        }
        Ok(Self { min, max })
    }

    /// A box spanning `[0, extent - 1]` on every axis.
    pub fn from_extents(extents: &[Coordinate]) -> Result<Self, RedistError> {
        Self::new(vec![0; extents.len()], extents.iter().map(|e| e - 1).collect())
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    /// Number of vertices along `axis` (zero when the box is empty there).
    #[inline]
    pub fn extent(&self, axis: usize) -> u64 {
        if self.max[axis] < self.min[axis] {
            0
        } else {
            (self.max[axis] - self.min[axis] + 1) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..self.dim()).any(|a| self.max[a] < self.min[a])
    }

    /// Total number of vertices.
    pub fn num_vertices(&self) -> u64 {
        (0..self.dim()).map(|a| self.extent(a)).product()
    }

    pub fn contains(&self, vertex: &[Coordinate]) -> bool {
        vertex.len() == self.dim()
            && (0..self.dim()).all(|a| vertex[a] >= self.min[a] && vertex[a] <= self.max[a])
    }

    /// Component-wise intersection. The result may be empty.
    pub fn intersect(&self, other: &Bounds) -> Bounds {
        debug_assert_eq!(self.dim(), other.dim());
        Bounds {
            min: self.min.iter().zip(&other.min).map(|(a, b)| *a.max(b)).collect(),
            max: self.max.iter().zip(&other.max).map(|(a, b)| *a.min(b)).collect(),
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        (0..self.dim()).all(|a| self.min[a].max(other.min[a]) <= self.max[a].min(other.max[a]))
    }

    /// Grow by `ghost[a]` on both sides of every axis, then clamp to `limit`.
    pub fn grown_within(&self, ghost: &[Coordinate], limit: &Bounds) -> Bounds {
        let mut out = self.clone();
        for a in 0..self.dim() {
            let g = ghost.get(a).copied().unwrap_or(0);
            out.min[a] = (self.min[a] - g).max(limit.min[a]);
            out.max[a] = (self.max[a] + g).min(limit.max[a]);
        }
        out
    }

    /// Both corners must have `dim` coordinates; the fields are public, so a
    /// literal can break this.
    pub(crate) fn check_dim(&self, dim: usize) -> Result<(), RedistError> {
        for len in [self.min.len(), self.max.len()] {
            if len != dim {
                return Err(RedistError::DimensionMismatch { expected: dim, found: len });
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?} : {:?}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(min: &[i64], max: &[i64]) -> Bounds {
        Bounds::new(min.to_vec(), max.to_vec()).unwrap()
    }

    #[test]
    fn ragged_corners_fail_dim_check() {
        let bx = Bounds {
            min: vec![0, 0, 0],
            max: vec![4, 4],
        };
        assert!(matches!(
            bx.check_dim(3),
            Err(RedistError::DimensionMismatch { expected: 3, found: 2 })
        ));
        assert!(b(&[0, 0], &[1, 1]).check_dim(2).is_ok());
    }

    #[test]
    fn vertex_counts_are_inclusive() {
        let bx = b(&[0, 0], &[3, 1]);
        assert_eq!(bx.num_vertices(), 8);
        assert_eq!(bx.extent(0), 4);
        assert!(!bx.is_empty());
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let a = b(&[0], &[255]);
        let c = b(&[256], &[511]);
        assert!(a.intersect(&c).is_empty());
        assert!(!a.intersects(&c));
        assert_eq!(a.intersect(&c).num_vertices(), 0);
    }

    #[test]
    fn intersection_of_overlapping_boxes() {
        let a = b(&[0, 0], &[9, 9]);
        let c = b(&[5, -3], &[20, 4]);
        assert_eq!(a.intersect(&c), b(&[5, 0], &[9, 4]));
    }

    #[test]
    fn grow_clamps_to_domain() {
        let dom = b(&[0, 0], &[9, 9]);
        let core = b(&[0, 5], &[4, 9]);
        assert_eq!(core.grown_within(&[1, 2], &dom), b(&[0, 3], &[5, 9]));
    }

    #[test]
    fn mismatched_corners_rejected() {
        assert!(matches!(
            Bounds::new(vec![0, 0], vec![1]),
            Err(RedistError::DimensionMismatch { .. })
        ));
        assert!(Bounds::new(vec![], vec![]).is_err());
    }
}
