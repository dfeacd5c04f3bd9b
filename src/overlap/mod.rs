//! Overlap resolution between two decompositions of the same domain.
//!
//! [`spatial`] handles the grid payload (box intersections), [`range`] the point
//! payload (global index intervals). Neither side of an exchange ever receives
//! these results over the wire; both compute them from the decompositions.

pub mod range;
pub mod spatial;

pub use range::{PointLayout, PointOverlap, PointRange, point_overlaps};
pub use spatial::{GridFragment, incoming_fragments, outgoing_fragments};
