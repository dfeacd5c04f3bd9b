#![cfg_attr(docsrs, feature(doc_cfg))]
//! # block-redist
//!
//! block-redist moves block-decomposed data from one group of workers (the
//! producers) to another (the consumers) whose decomposition of the same global
//! domain differs in block count. Two payloads travel: a dense grid of scalars,
//! one per integer vertex of the domain, and a set of unstructured points
//! addressed by global index.
//!
//! ## Features
//! - Regular decomposition of an integer box into `N` blocks, with automatic
//!   per-axis division factoring and optional ghost margins
//! - Overlap resolution between two decompositions: spatial for the grid,
//!   numeric-range for the points, both ends computing the same fragment list
//! - A redistribution engine over non-blocking point-to-point messages, with
//!   full validation of what every consumer block receives
//! - A readiness rendezvous for disjoint groups or for processes that play both
//!   roles
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Ordering
//!
//! Fragments carry values only. The k-th value of a grid fragment is the k-th
//! vertex of the shared intersection box in row-major order (axis 0 outermost),
//! see [`topology::grid::GridShape`]; the k-th point of a point fragment is the
//! k-th global index of the shared range.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! block-redist = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! The `workflow` module runs whole rounds; the `algs::redistribution`
//! functions can be driven directly for custom schedules.

// Re-export our major subsystems:
pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod overlap;
pub mod redist_error;
pub mod topology;
pub mod workflow;

pub use debug_invariants::DebugInvariants;
pub use redist_error::RedistError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{
        CommTag, Communicator, NoComm, RayonComm, RedistTags, Wait,
    };
    pub use crate::algs::readiness::{Topology, await_ready, signal_ready};
    pub use crate::algs::redistribution::{
        ExchangeStats, recv_grid, recv_points, send_grid, send_points, wait_outstanding,
    };
    pub use crate::data::{Block, BlockState, CanonicalPayload, Master, PayloadGenerator, PointSet};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::overlap::{PointLayout, PointRange};
    pub use crate::redist_error::RedistError;
    pub use crate::topology::{Bounds, ContiguousAssigner, Decomposition, GridShape, RegularDecomposer};
    pub use crate::workflow::{
        ConsumerRole, RedistConfig, RoundReport, run_consumer, run_producer, run_shared,
    };
}
