//! Flat storage for unstructured points.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A sequence of `dim`-dimensional points stored as one contiguous coordinate
/// array, so any run of points is a single slice (and a single wire fragment).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    dim: usize,
    coords: Vec<f64>,
}

impl PointSet {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            coords: Vec::new(),
        }
    }

    pub fn with_capacity(dim: usize, n: usize) -> Self {
        Self {
            dim,
            coords: Vec::with_capacity(dim * n),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.coords.len() / self.dim }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn point(&self, i: usize) -> &[f64] {
        &self.coords[i * self.dim..(i + 1) * self.dim]
    }

    /// Append one point; `p.len()` must equal `dim`.
    pub fn push(&mut self, p: &[f64]) {
        debug_assert_eq!(p.len(), self.dim);
        self.coords.extend_from_slice(p);
    }

    /// Append a run of points given as flat coordinates.
    pub fn extend_flat(&mut self, coords: &[f64]) {
        debug_assert_eq!(coords.len() % self.dim.max(1), 0);
        self.coords.extend_from_slice(coords);
    }

    /// Coordinates of the points in `range`, flattened.
    pub fn slice(&self, range: Range<usize>) -> &[f64] {
        &self.coords[range.start * self.dim..range.end * self.dim]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.coords.chunks_exact(self.dim.max(1))
    }

    pub fn clear(&mut self) {
        self.coords.clear();
    }
}
