//! Canonical vertex ordering.
//!
//! [`GridShape`] is the single mapping between a vertex of a box and its linear
//! position. Axis 0 is the outermost (slowest varying) axis and axis `D-1` the
//! innermost. The grid payload, the sender's fragment encoder and the receiver's
//! fragment decoder all walk boxes through this type, which is what lets a
//! fragment travel without any index metadata.

use super::bounds::{Bounds, Coordinate};

/// Row-major index space over the vertices of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridShape {
    origin: Vec<Coordinate>,
    shape: Vec<u64>,
    /// `strides[a]` = product of `shape[a+1..]`.
    strides: Vec<u64>,
}

impl GridShape {
    pub fn new(bounds: &Bounds) -> Self {
        let dim = bounds.dim();
        let shape: Vec<u64> = (0..dim).map(|a| bounds.extent(a)).collect();
        let mut strides = vec![1u64; dim];
        for a in (0..dim.saturating_sub(1)).rev() {
            strides[a] = strides[a + 1] * shape[a + 1];
        }
        Self {
            origin: bounds.min.clone(),
            shape,
            strides,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Linear index of an absolute vertex. The vertex must lie inside the box.
    #[inline]
    pub fn index(&self, vertex: &[Coordinate]) -> u64 {
        debug_assert_eq!(vertex.len(), self.dim());
        vertex
            .iter()
            .zip(&self.origin)
            .zip(&self.strides)
            .map(|((v, o), s)| (v - o) as u64 * s)
            .sum()
    }

    /// Absolute vertex at a linear index; inverse of [`GridShape::index`].
    pub fn vertex(&self, mut index: u64) -> Vec<Coordinate> {
        let mut out = vec![0; self.dim()];
        for a in 0..self.dim() {
            let q = index / self.strides[a];
            index -= q * self.strides[a];
            out[a] = self.origin[a] + q as Coordinate;
        }
        out
    }

    /// Iterate the vertices of the box in canonical order.
    pub fn vertices(&self) -> Vertices<'_> {
        Vertices {
            grid: self,
            next: if self.size() == 0 {
                None
            } else {
                Some(self.origin.clone())
            },
        }
    }
}

/// Odometer over the vertices of a [`GridShape`], innermost axis fastest.
pub struct Vertices<'a> {
    grid: &'a GridShape,
    next: Option<Vec<Coordinate>>,
}

impl Iterator for Vertices<'_> {
    type Item = Vec<Coordinate>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut succ = current.clone();
        let mut axis = self.grid.dim();
        while axis > 0 {
            axis -= 1;
            let hi = self.grid.origin[axis] + self.grid.shape[axis] as Coordinate - 1;
            if succ[axis] < hi {
                succ[axis] += 1;
                self.next = Some(succ);
                return Some(current);
            }
            succ[axis] = self.grid.origin[axis];
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn last_axis_is_fastest() {
        let g = GridShape::new(&Bounds::new(vec![10, 20], vec![11, 22]).unwrap());
        let order: Vec<_> = g.vertices().collect();
        assert_eq!(
            order,
            vec![
                vec![10, 20],
                vec![10, 21],
                vec![10, 22],
                vec![11, 20],
                vec![11, 21],
                vec![11, 22]
            ]
        );
        assert_eq!(g.index(&[11, 20]), 3);
    }

    #[test]
    fn empty_box_has_no_vertices() {
        let g = GridShape::new(&Bounds::new(vec![5, 0], vec![4, 3]).unwrap());
        assert_eq!(g.size(), 0);
        assert_eq!(g.vertices().count(), 0);
    }

    proptest! {
        #[test]
        fn iteration_order_agrees_with_index(
            lo in proptest::collection::vec(-5i64..5, 1..4),
            ext in proptest::collection::vec(1i64..5, 3),
        ) {
            let max: Vec<_> = lo.iter().zip(&ext).map(|(l, e)| l + e - 1).collect();
            let g = GridShape::new(&Bounds::new(lo.clone(), max).unwrap());
            let mut count = 0u64;
            for (i, v) in g.vertices().enumerate() {
                prop_assert_eq!(g.index(&v), i as u64);
                prop_assert_eq!(g.vertex(i as u64), v);
                count += 1;
            }
            prop_assert_eq!(count, g.size());
        }
    }
}
