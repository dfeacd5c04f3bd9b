//! Point redistribution: runs of global indices, cut by numeric-range overlap.

use super::{ExchangeStats, drain_and_fail, receive_exact};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireCoord, decode_coords, encode_coords};
use crate::data::block::{Block, BlockState, PendingSend};
use crate::data::generator::PayloadGenerator;
use crate::data::master::Master;
use crate::data::points::PointSet;
use crate::overlap::range::{PointLayout, PointRange, point_overlaps};
use crate::redist_error::RedistError;
use crate::topology::assigner::ContiguousAssigner;

/// Send every local block's points to the blocks of a `peer_nblocks`-block
/// layout over the same `global` count.
pub fn send_points<C>(
    master: &mut Master<C::SendHandle>,
    global: u64,
    peer_nblocks: usize,
    comm: &C,
    tag: CommTag,
) -> Result<ExchangeStats, RedistError>
where
    C: Communicator,
{
    let layouts = PointLayout::new(global, master.nblocks())
        .and_then(|own| PointLayout::new(global, peer_nblocks).map(|peer| (own, peer)));
    let (own, peer) = match layouts {
        Ok(l) => l,
        Err(e) => return drain_and_fail(master, e),
    };
    let owners = ContiguousAssigner::new(comm.remote_size(), peer_nblocks);
    let mut stats = ExchangeStats::default();
    let mut maybe_err = None;
    for block in master.blocks_mut() {
        if let Err(e) = stage_block(block, &own, &peer, comm, tag, &owners, &mut stats) {
            maybe_err = Some(e);
            break;
        }
    }
    if let Some(err) = maybe_err {
        return drain_and_fail(master, err);
    }
    log::info!(
        "rank {}: points sent from {} blocks, {} fragments, {} bytes",
        comm.rank(),
        stats.blocks,
        stats.fragments,
        stats.bytes
    );
    Ok(stats)
}

fn stage_block<C>(
    block: &mut Block<C::SendHandle>,
    own: &PointLayout,
    peer: &PointLayout,
    comm: &C,
    tag: CommTag,
    owners: &ContiguousAssigner,
    stats: &mut ExchangeStats,
) -> Result<(), RedistError>
where
    C: Communicator,
{
    block.state = BlockState::Staging;
    let range = own.range(block.gid)?;
    if block.point_range != range || block.points.len() as u64 != range.len() {
        return Err(RedistError::PointCount {
            gid: block.gid,
            received: block.points.len(),
            expected: range.len() as usize,
        });
    }
    for overlap in point_overlaps(range, peer)? {
        let dest_tag = tag.for_block(overlap.peer)?;
        let dest = owners.rank(overlap.peer);
        let buf = encode_coords(block.points.slice(overlap.local.clone()));
        log::debug!(
            "points: block {} -> block {} (rank {dest}, tag {dest_tag:#06x}) [{}, {})",
            block.gid,
            overlap.peer,
            overlap.range.start,
            overlap.range.end
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

/// Receive the points of each local block's range from a `peer_nblocks`-block
/// layout, in ascending source order, and check them against `generator`.
pub fn recv_points<C, S, G>(
    master: &mut Master<S>,
    global: u64,
    peer_nblocks: usize,
    comm: &C,
    tag: CommTag,
    generator: &G,
) -> Result<ExchangeStats, RedistError>
where
    C: Communicator,
    G: PayloadGenerator + ?Sized,
{
    let own = PointLayout::new(global, master.nblocks())?;
    let peer = PointLayout::new(global, peer_nblocks)?;
    let owners = ContiguousAssigner::new(comm.remote_size(), peer_nblocks);
    let mut stats = ExchangeStats::default();
    let mut maybe_err: Option<RedistError> = None;
    let mut ranges = Vec::with_capacity(master.len());

    // 1) receive; ranges arrive in ascending order, so appending keeps positions
    for block in master.blocks_mut() {
        block.state = BlockState::Receiving;
        let dim = block.dim();
        let range = match own.range(block.gid) {
            Ok(r) => r,
            Err(e) => {
                maybe_err.get_or_insert(e);
                ranges.push(PointRange::new(0, 0));
                continue;
            }
        };
        block.recv_points = PointSet::with_capacity(dim, range.len() as usize);
        let overlaps = match point_overlaps(range, &peer) {
            Ok(o) => o,
            Err(e) => {
                maybe_err.get_or_insert(e);
                ranges.push(range);
                continue;
            }
        };
        for overlap in overlaps {
            let src = owners.rank(overlap.peer);
            let expected = overlap.len() * dim * WireCoord::SIZE;
            let data = tag
                .for_block(block.gid)
                .and_then(|t| receive_exact(comm, src, t, expected, overlap.peer, block.gid));
            match data {
                Ok(bytes) if maybe_err.is_none() => {
                    log::debug!(
                        "points: block {} <- block {} (rank {src}) [{}, {})",
                        block.gid,
                        overlap.peer,
                        overlap.range.start,
                        overlap.range.end
                    );
                    stats.record(bytes.len());
                    let coords: Vec<f64> = decode_coords(&bytes).collect();
                    block.recv_points.extend_flat(&coords);
                }
                Ok(_) => {}
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            }
        }
        ranges.push(range);
        stats.blocks += 1;
    }
    if let Some(err) = maybe_err {
        log::error!("rank {}: point receive failed: {err}", comm.rank());
        return Err(err);
    }

    // 2) validate
    for (block, range) in master.blocks_mut().iter_mut().zip(ranges) {
        validate_points(block, range, generator)?;
    }
    log::info!(
        "rank {}: points received into {} blocks, {} fragments, {} bytes",
        comm.rank(),
        stats.blocks,
        stats.fragments,
        stats.bytes
    );
    Ok(stats)
}

/// Check the received points of `block` against its expected `range`: the
/// count must match and the k-th point must carry index `range.start + k`.
pub fn validate_points<S, G>(
    block: &mut Block<S>,
    range: PointRange,
    generator: &G,
) -> Result<(), RedistError>
where
    G: PayloadGenerator + ?Sized,
{
    block.state = BlockState::Validating;
    let expected = range.len() as usize;
    if block.recv_points.len() != expected {
        let err = RedistError::PointCount {
            gid: block.gid,
            received: block.recv_points.len(),
            expected,
        };
        log::error!("{err}");
        return Err(err);
    }
    for (position, p) in block.recv_points.iter().enumerate() {
        let err = match generator.point_index(p) {
            Some(index) if !range.contains(index) => {
                RedistError::PointOutOfRange {
                    gid: block.gid,
                    position,
                    index,
                    start: range.start,
                    end: range.end,
                }
            }
            Some(index) if index != range.start + position as u64 => {
                RedistError::PointOutOfSequence {
                    gid: block.gid,
                    position,
                    index,
                    expected: range.start + position as u64,
                }
            }
            Some(_) => continue,
            None => RedistError::PointOutOfRange {
                gid: block.gid,
                position,
                index: u64::MAX,
                start: range.start,
                end: range.end,
            },
        };
        log::error!("{err}");
        return Err(err);
    }
    block.state = BlockState::Done;
    Ok(())
}
