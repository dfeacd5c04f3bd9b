//! Geometry of the global domain: boxes, the canonical vertex ordering, the
//! regular decomposition into blocks and the assignment of blocks to ranks.

pub mod assigner;
pub mod bounds;
pub mod decomposition;
pub mod grid;

pub use assigner::ContiguousAssigner;
pub use bounds::{Bounds, Coordinate};
pub use decomposition::{Decomposition, RegularDecomposer, decompose};
pub use grid::GridShape;
