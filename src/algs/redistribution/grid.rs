//! Grid redistribution: boxes of vertices, cut from source cores.

use super::{ExchangeStats, drain_and_fail, receive_exact};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireValue, decode_values, encode_values};
use crate::data::block::{Block, BlockState, PendingSend};
use crate::data::generator::PayloadGenerator;
use crate::data::master::Master;
use crate::overlap::spatial::{local_indices, outgoing_fragments, incoming_fragments};
use crate::redist_error::RedistError;
use crate::topology::assigner::ContiguousAssigner;
use crate::topology::decomposition::Decomposition;
use crate::topology::grid::GridShape;

/// Issue one non-blocking send per non-empty overlap between each local core
/// and the blocks of `peer`. Handles stay in the blocks until
/// [`wait_outstanding`](super::wait_outstanding).
///
/// On error every send already issued is drained before returning.
pub fn send_grid<C, D>(
    master: &mut Master<C::SendHandle>,
    peer: &D,
    comm: &C,
    tag: CommTag,
) -> Result<ExchangeStats, RedistError>
where
    C: Communicator,
    D: Decomposition + ?Sized,
{
    let owners = ContiguousAssigner::new(comm.remote_size(), peer.nblocks());
    let mut stats = ExchangeStats::default();
    let mut maybe_err = None;
    for block in master.blocks_mut() {
        if let Err(e) = stage_block(block, peer, comm, tag, &owners, &mut stats) {
            maybe_err = Some(e);
            break;
        }
    }
    if let Some(err) = maybe_err {
        return drain_and_fail(master, err);
    }
    log::info!(
        "rank {}: grid sent from {} blocks, {} fragments, {} bytes",
        comm.rank(),
        stats.blocks,
        stats.fragments,
        stats.bytes
    );
    Ok(stats)
}

fn stage_block<C, D>(
    block: &mut Block<C::SendHandle>,
    peer: &D,
    comm: &C,
    tag: CommTag,
    owners: &ContiguousAssigner,
    stats: &mut ExchangeStats,
) -> Result<(), RedistError>
where
    C: Communicator,
    D: Decomposition + ?Sized,
{
    block.state = BlockState::Staging;
    let expected = block.bounds.num_vertices() as usize;
    if block.grid.len() != expected {
        return Err(RedistError::GridCount {
            gid: block.gid,
            received: block.grid.len(),
            expected,
        });
    }
    let shape = block.shape();
    for frag in outgoing_fragments(&block.core, peer)? {
        let dest_tag = tag.for_block(frag.peer)?;
        let dest = owners.rank(frag.peer);
        let buf = encode_values(local_indices(&shape, &frag.int_bounds).map(|i| block.grid[i]));
        log::debug!(
            "grid: block {} -> block {} (rank {dest}, tag {dest_tag:#06x}) {} values over {}",
            block.gid,
            frag.peer,
            frag.len(),
            frag.int_bounds
        );
        let bytes = buf.len();
        stats.record(bytes);
        let handle = comm.isend(dest, dest_tag, buf);
        block.push_pending(PendingSend {
            peer: dest,
            tag: dest_tag,
            bytes,
            handle,
        });
    }
    block.state = BlockState::Sending;
    stats.blocks += 1;
    Ok(())
}

/// Receive, in ascending source order, every fragment that covers the bounds of
/// each local block, then validate the assembled grids against `generator`.
///
/// Receives for all blocks are completed before the first error is returned.
pub fn recv_grid<C, D, S, G>(
    master: &mut Master<S>,
    peer: &D,
    comm: &C,
    tag: CommTag,
    generator: &G,
) -> Result<ExchangeStats, RedistError>
where
    C: Communicator,
    D: Decomposition + ?Sized,
    G: PayloadGenerator + ?Sized,
{
    let owners = ContiguousAssigner::new(comm.remote_size(), peer.nblocks());
    let mut stats = ExchangeStats::default();
    let mut maybe_err: Option<RedistError> = None;
    let mut received = Vec::with_capacity(master.len());

    // 1) receive and decode in place
    for block in master.blocks_mut() {
        block.state = BlockState::Receiving;
        block.recv_grid = vec![0; block.bounds.num_vertices() as usize];
        let mut count = 0usize;
        match incoming_fragments(&block.bounds, peer) {
            Ok(fragments) => {
                let shape = block.shape();
                for frag in fragments {
                    let src = owners.rank(frag.peer);
                    let data = tag.for_block(block.gid).and_then(|t| {
                        receive_exact(comm, src, t, frag.len() * WireValue::SIZE, frag.peer, block.gid)
                    });
                    match data {
                        Ok(bytes) if maybe_err.is_none() => {
                            log::debug!(
                                "grid: block {} <- block {} (rank {src}) {} values",
                                block.gid,
                                frag.peer,
                                frag.len()
                            );
                            stats.record(bytes.len());
                            let slots = local_indices(&shape, &frag.int_bounds);
                            for (i, v) in slots.zip(decode_values(&bytes)) {
                                block.recv_grid[i] = v;
                                count += 1;
                            }
                        }
                        Ok(_) => {} // already failing; just drain
                        Err(e) => {
                            maybe_err.get_or_insert(e);
                        }
                    }
                }
            }
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
        received.push(count);
        stats.blocks += 1;
    }
    if let Some(err) = maybe_err {
        log::error!("rank {}: grid receive failed: {err}", comm.rank());
        return Err(err);
    }

    // 2) validate
    for (block, count) in master.blocks_mut().iter_mut().zip(received) {
        validate_grid(block, count, generator)?;
    }
    log::info!(
        "rank {}: grid received into {} blocks, {} fragments, {} bytes",
        comm.rank(),
        stats.blocks,
        stats.fragments,
        stats.bytes
    );
    Ok(stats)
}

/// Compare every received value with the generation rule.
pub fn validate_grid<S, G>(
    block: &mut Block<S>,
    received: usize,
    generator: &G,
) -> Result<(), RedistError>
where
    G: PayloadGenerator + ?Sized,
{
    block.state = BlockState::Validating;
    let expected = block.recv_grid.len();
    if received != expected {
        let err = RedistError::GridCount {
            gid: block.gid,
            received,
            expected,
        };
        log::error!("{err}");
        return Err(err);
    }
    let domain = GridShape::new(&block.domain);
    let shape = block.shape();
    for (index, (vertex, &found)) in shape.vertices().zip(&block.recv_grid).enumerate() {
        let want = generator.grid_value(&domain, &vertex);
        if found != want {
            let err = RedistError::GridMismatch {
                gid: block.gid,
                index,
                found,
                expected: want,
            };
            log::error!("{err} at vertex {vertex:?}");
            return Err(err);
        }
    }
    block.state = BlockState::Done;
    Ok(())
}
