//! Re-export public algorithms.

pub mod communicator;
pub mod readiness;
pub mod redistribution;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, RayonComm, RedistTags, Wait};
pub use readiness::{Topology, await_ready, signal_ready};
pub use redistribution::{
    ExchangeStats, recv_grid, recv_points, send_grid, send_points, wait_outstanding,
};
