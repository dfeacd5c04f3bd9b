//! Redistribution of block payloads between two decompositions of one domain.
//!
//! Direction is chosen by the function, not by a flag: producers call
//! [`send_grid`]/[`send_points`] and later [`wait_outstanding`], consumers call
//! [`recv_grid`]/[`recv_points`]. Both sides derive the same fragment list from
//! the overlap resolver, so sizes and order are known before anything arrives.
//!
//! Addressing: a fragment for peer block `g` goes to the rank owning `g`
//! (contiguous assignment over the remote group) with tag `family + g`.

pub mod grid;
pub mod points;

pub use grid::{recv_grid, send_grid};
pub use points::{recv_points, send_points};

use crate::algs::communicator::{Communicator, Wait};
use crate::algs::wire::expect_exact_len;
use crate::data::block::BlockState;
use crate::data::master::Master;
use crate::redist_error::RedistError;

/// Traffic of one exchange call on one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub blocks: usize,
    pub fragments: usize,
    pub bytes: usize,
}

impl ExchangeStats {
    fn record(&mut self, bytes: usize) {
        self.fragments += 1;
        self.bytes += bytes;
    }
}

impl std::ops::AddAssign for ExchangeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.blocks += rhs.blocks;
        self.fragments += rhs.fragments;
        self.bytes += rhs.bytes;
    }
}

/// Block until every send issued by the local blocks has completed, releasing
/// the fragment buffers. Returns how many sends were drained.
pub fn wait_outstanding<S: Wait>(master: &mut Master<S>) -> usize {
    let mut drained = 0;
    for block in master.blocks_mut() {
        for send in block.take_pending() {
            let _ = send.handle.wait();
            drained += 1;
        }
        if matches!(block.state, BlockState::Staging | BlockState::Sending) {
            block.state = BlockState::Done;
        }
    }
    drained
}

/// Drain whatever was issued, then hand the error back.
fn drain_and_fail<S: Wait, T>(master: &mut Master<S>, err: RedistError) -> Result<T, RedistError> {
    let drained = wait_outstanding(master);
    log::debug!("drained {drained} sends after error: {err}");
    Err(err)
}

/// One blocking receive whose size is known in advance.
fn receive_exact<C: Communicator>(
    comm: &C,
    src_rank: usize,
    tag: u16,
    expected: usize,
    source_gid: usize,
    target_gid: usize,
) -> Result<Vec<u8>, RedistError> {
    let data = comm.irecv(src_rank, tag).wait().ok_or_else(|| {
        RedistError::comm(
            src_rank,
            format!("no fragment from block {source_gid} for block {target_gid}"),
        )
    })?;
    expect_exact_len(data.len(), expected).map_err(|detail| RedistError::FragmentLength {
        source_gid,
        target_gid,
        detail,
    })?;
    Ok(data)
}
