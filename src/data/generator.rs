//! Payload generation rules.
//!
//! A generator is consulted twice: once on the producer side to fill a block
//! when it is created, and once on the consumer side to recompute what every
//! received value should have been. Both uses must agree, so a generator is a
//! pure function of global position.

use crate::topology::bounds::Coordinate;
use crate::topology::grid::GridShape;

/// Deterministic source of grid values and point coordinates.
pub trait PayloadGenerator: Send + Sync {
    /// Value stored at the absolute `vertex` of a grid over `domain`.
    fn grid_value(&self, domain: &GridShape, vertex: &[Coordinate]) -> u64;

    /// Write the coordinates of the point with global index `index` into `out`
    /// (`out.len()` is the point dimension).
    fn fill_point(&self, index: u64, out: &mut [f64]);

    /// Recover the global index a point was generated from, or `None` if the
    /// coordinates cannot come from this generator.
    fn point_index(&self, point: &[f64]) -> Option<u64> {
        let x = *point.first()?;
        if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64 {
            Some(x as u64)
        } else {
            None
        }
    }
}

/// Grid values are canonical global linear indices; every coordinate of a
/// point equals its global index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalPayload;

impl PayloadGenerator for CanonicalPayload {
    #[inline]
    fn grid_value(&self, domain: &GridShape, vertex: &[Coordinate]) -> u64 {
        domain.index(vertex)
    }

    #[inline]
    fn fill_point(&self, index: u64, out: &mut [f64]) {
        out.fill(index as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::bounds::Bounds;

    #[test]
    fn grid_value_is_global_index() {
        let domain = GridShape::new(&Bounds::from_extents(&[4, 5]).unwrap());
        assert_eq!(CanonicalPayload.grid_value(&domain, &[0, 0]), 0);
        assert_eq!(CanonicalPayload.grid_value(&domain, &[1, 0]), 5);
        assert_eq!(CanonicalPayload.grid_value(&domain, &[3, 4]), 19);
    }

    #[test]
    fn point_index_roundtrip() {
        let mut p = [0.0; 3];
        CanonicalPayload.fill_point(1234, &mut p);
        assert_eq!(p, [1234.0; 3]);
        assert_eq!(CanonicalPayload.point_index(&p), Some(1234));
    }

    #[test]
    fn garbage_points_have_no_index() {
        assert_eq!(CanonicalPayload.point_index(&[-1.0, 0.0]), None);
        assert_eq!(CanonicalPayload.point_index(&[0.5]), None);
        assert_eq!(CanonicalPayload.point_index(&[f64::NAN]), None);
        assert_eq!(CanonicalPayload.point_index(&[]), None);
    }
}
