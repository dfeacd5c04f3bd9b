//! Data module: blocks, their payloads and the local block collection.

pub mod block;
pub mod generator;
pub mod master;
pub mod points;

pub use block::{Block, BlockState, PendingSend};
pub use generator::{CanonicalPayload, PayloadGenerator};
pub use master::{BlockPlacement, Master};
pub use points::PointSet;
