//! The blocks held by one process.

use super::block::Block;
use super::generator::PayloadGenerator;
use crate::debug_invariants::DebugInvariants;
use crate::overlap::range::PointLayout;
use crate::redist_error::RedistError;
use crate::topology::assigner::ContiguousAssigner;
use crate::topology::bounds::Bounds;
use crate::topology::decomposition::Decomposition;

/// Where a new block sits in its decomposition; handed to the creation callback.
#[derive(Debug, Clone)]
pub struct BlockPlacement {
    pub gid: usize,
    pub core: Bounds,
    pub bounds: Bounds,
    pub domain: Bounds,
}

/// Local blocks of one decomposition, in ascending `gid` order.
#[derive(Debug)]
pub struct Master<S = ()> {
    nblocks: usize,
    blocks: Vec<Block<S>>,
}

impl<S> Master<S> {
    /// Create the blocks `assigner` gives to `rank`, calling `create` once per
    /// block in ascending `gid` order.
    ///
    /// # Errors
    /// Propagates decomposition errors and anything `create` returns.
    pub fn decompose<D, F>(
        decomposition: &D,
        rank: usize,
        assigner: &ContiguousAssigner,
        mut create: F,
    ) -> Result<Self, RedistError>
    where
        D: Decomposition + ?Sized,
        F: FnMut(BlockPlacement) -> Result<Block<S>, RedistError>,
    {
        let nblocks = decomposition.nblocks();
        let mut blocks = Vec::with_capacity(assigner.local_gids(rank).len());
        for gid in assigner.local_gids(rank) {
            let placement = BlockPlacement {
                gid,
                core: decomposition.core_for(gid)?,
                bounds: decomposition.bounds_for(gid)?,
                domain: decomposition.domain().clone(),
            };
            let block = create(placement)?;
            block.debug_assert_invariants();
            blocks.push(block);
        }
        if blocks.is_empty() {
            log::warn!("rank {rank} holds none of the {nblocks} blocks");
        }
        Ok(Self { nblocks, blocks })
    }

    /// [`Master::decompose`] with the usual creation callback: every block is
    /// generated by `generator` with its range of `layout`.
    pub fn generate<D, G>(
        decomposition: &D,
        rank: usize,
        assigner: &ContiguousAssigner,
        layout: &PointLayout,
        generator: &G,
    ) -> Result<Self, RedistError>
    where
        D: Decomposition + ?Sized,
        G: PayloadGenerator + ?Sized,
    {
        Self::decompose(decomposition, rank, assigner, |p| {
            let mut block = Block::new(p.gid, p.core, p.bounds, p.domain);
            block.generate(generator, layout.range(p.gid)?);
            Ok(block)
        })
    }

    /// Number of blocks in the whole decomposition, not only the local ones.
    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block<S>] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block<S>] {
        &mut self.blocks
    }

    pub fn get(&self, gid: usize) -> Option<&Block<S>> {
        self.blocks
            .binary_search_by_key(&gid, |b| b.gid)
            .ok()
            .map(|i| &self.blocks[i])
    }

    /// Run `f` on every local block in ascending `gid` order, stopping at the
    /// first error.
    pub fn foreach<F>(&mut self, mut f: F) -> Result<(), RedistError>
    where
        F: FnMut(&mut Block<S>) -> Result<(), RedistError>,
    {
        self.blocks.iter_mut().try_for_each(|b| f(b))
    }

    /// Number of sends still outstanding across all local blocks.
    pub fn outstanding(&self) -> usize {
        self.blocks.iter().map(|b| b.pending().len()).sum()
    }
}
