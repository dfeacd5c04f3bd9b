//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte buffers*. `isend` takes ownership of its
//! buffer and the returned handle keeps it alive until `.wait()`; receive
//! handles block in `.wait()` until the matching message is delivered.
//! Addresses are small integers scoped to the connected group: on a channel
//! between two groups, `peer` always names a rank of the *other* group.

use crate::redist_error::RedistError;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

/// Non-blocking point-to-point interface plus a group-wide barrier.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;

    /// This process's address within its own group.
    fn rank(&self) -> usize;
    /// Number of ranks in this process's own group.
    fn size(&self) -> usize;
    /// Number of addressable peers; equals `size()` unless the channel
    /// connects two groups.
    fn remote_size(&self) -> usize {
        self.size()
    }
    /// Block until every member of every group on this channel has arrived.
    fn barrier(&self);

    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// A message tag. Per-block tags are `base + gid`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Blocks addressable per tag family.
    pub const BLOCK_SPAN: usize = 0x3000;

    /// Largest tag every MPI implementation must accept (`MPI_TAG_UB >= 32767`).
    pub const MAX_TAG: u16 = 0x7FFF;

    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }

    /// Tag for messages addressed to block `gid`.
    pub fn for_block(self, gid: usize) -> Result<u16, RedistError> {
        if gid >= Self::BLOCK_SPAN {
            return Err(RedistError::TagOverflow { base: self.0, gid });
        }
        u16::try_from(gid)
            .ok()
            .and_then(|g| self.0.checked_add(g))
            .filter(|&t| t <= Self::MAX_TAG)
            .ok_or(RedistError::TagOverflow { base: self.0, gid })
    }
}

/// Tag families used by one redistribution round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistTags {
    pub grid: CommTag,
    pub points: CommTag,
    pub ready: CommTag,
}

impl Default for RedistTags {
    fn default() -> Self {
        Self {
            grid: CommTag(0x1000),
            points: CommTag(0x4000),
            ready: CommTag(0x0042),
        }
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: Bytes) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- RayonComm: intra-process / multi-thread ---

/// (group, rank) of one endpoint.
type Endpoint = (u8, usize);
type Key = (Endpoint, Endpoint, u16); // (src, dst, tag)

/// Shared state of one set of connected in-process communicators.
struct Fabric {
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    posted: Mutex<u64>,
    arrived: Condvar,
    barrier: Barrier,
}

impl Fabric {
    fn new(participants: usize) -> Arc<Self> {
        Arc::new(Self {
            mailbox: DashMap::new(),
            posted: Mutex::new(0),
            arrived: Condvar::new(),
            barrier: Barrier::new(participants),
        })
    }

    fn post(&self, key: Key, buf: Bytes) {
        self.mailbox.entry(key).or_default().push_back(buf);
        let mut posted = self.posted.lock();
        *posted += 1;
        self.arrived.notify_all();
    }

    fn take(&self, key: &Key) -> Bytes {
        let mut posted = self.posted.lock();
        loop {
            if let Some(buf) = self.mailbox.get_mut(key).and_then(|mut q| q.pop_front()) {
                return buf;
            }
            self.arrived.wait(&mut posted);
        }
    }
}

/// In-process communicator: each rank is a thread, messages go through a
/// mailbox shared by the ranks created together. Delivery is FIFO per
/// `(source, destination, tag)`.
#[derive(Clone)]
pub struct RayonComm {
    fabric: Arc<Fabric>,
    group: u8,
    rank: usize,
    size: usize,
    remote_group: u8,
    remote_size: usize,
}

impl std::fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonComm")
            .field("group", &self.group)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("remote_group", &self.remote_group)
            .field("remote_size", &self.remote_size)
            .finish()
    }
}

impl RayonComm {
    /// `n` ranks of a single group talking among themselves.
    pub fn world(n: usize) -> Vec<RayonComm> {
        let fabric = Fabric::new(n);
        (0..n)
            .map(|rank| RayonComm {
                fabric: fabric.clone(),
                group: 0,
                rank,
                size: n,
                remote_group: 0,
                remote_size: n,
            })
            .collect()
    }

    /// Two disjoint groups of `n_a` and `n_b` ranks; each side addresses the
    /// other. The barrier spans both groups.
    pub fn intercomm(n_a: usize, n_b: usize) -> (Vec<RayonComm>, Vec<RayonComm>) {
        let fabric = Fabric::new(n_a + n_b);
        let side = |group: u8, n: usize, remote_group: u8, remote_size: usize| {
            (0..n)
                .map(|rank| RayonComm {
                    fabric: fabric.clone(),
                    group,
                    rank,
                    size: n,
                    remote_group,
                    remote_size,
                })
                .collect::<Vec<_>>()
        };
        (side(0, n_a, 1, n_b), side(1, n_b, 0, n_a))
    }
}

pub struct LocalHandle {
    fabric: Arc<Fabric>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        Some(self.fabric.take(&self.key).to_vec())
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> Self::SendHandle {
        let key = ((self.group, self.rank), (self.remote_group, peer), tag);
        self.fabric.post(key, buf);
    }

    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle {
        let key = ((self.remote_group, peer), (self.group, self.rank), tag);
        LocalHandle {
            fabric: self.fabric.clone(),
            key,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn remote_size(&self) -> usize {
        self.remote_size
    }

    fn barrier(&self) {
        self.fabric.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::Threading;

    /// MPI channel over `MPI_COMM_WORLD`. A split channel addresses the ranks of
    /// the other group through a fixed offset into the world.
    #[derive(Clone)]
    pub struct MpiComm {
        universe: Arc<Universe>,
        rank: usize,
        size: usize,
        remote_offset: i32,
        remote_size: usize,
    }

    // SAFETY: MPI is initialized with `Threading::Multiple`, so the world
    // communicator may be used from any thread.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Initialize MPI; every world rank is addressable.
        pub fn new() -> Result<Self, RedistError> {
            let (universe, level) = mpi::initialize_with_threading(Threading::Multiple)
                .ok_or_else(|| RedistError::comm(0, "MPI initialization failed"))?;
            if level < Threading::Multiple {
                log::warn!("MPI provides {level:?} threading, not Multiple");
            }
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                universe: Arc::new(universe),
                rank,
                size,
                remote_offset: 0,
                remote_size: size,
            })
        }

        fn world(&self) -> SimpleCommunicator {
            self.universe.world()
        }

        /// Split the world into ranks `[0, n_first)` and `[n_first, size)`.
        /// The returned channel addresses the group this rank does *not*
        /// belong to; the flag tells whether this rank is in the first group.
        pub fn split(&self, n_first: usize) -> (MpiComm, bool) {
            let world_rank = self.world().rank() as usize;
            let world_size = self.world().size() as usize;
            let in_first = world_rank < n_first;
            let comm = if in_first {
                MpiComm {
                    universe: self.universe.clone(),
                    rank: world_rank,
                    size: n_first,
                    remote_offset: n_first as i32,
                    remote_size: world_size - n_first,
                }
            } else {
                MpiComm {
                    universe: self.universe.clone(),
                    rank: world_rank - n_first,
                    size: world_size - n_first,
                    remote_offset: 0,
                    remote_size: n_first,
                }
            };
            (comm, in_first)
        }
    }

    pub struct MpiSendHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        _buf: Bytes,
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(req) = self.req.take() {
                req.wait();
            }
        }
    }

    pub struct MpiRecvHandle {
        universe: Arc<Universe>,
        source: i32,
        tag: i32,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let world = self.universe.world();
            let (msg, _status) = world
                .process_at_rank(self.source)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(msg)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> MpiSendHandle {
            // SAFETY: the slice points into `buf`, which the handle owns and
            // keeps alive until the request completes (in `wait` or `drop`).
            let data: &'static [u8] =
                unsafe { std::slice::from_raw_parts(buf.as_ptr(), buf.len()) };
            let req = self
                .world()
                .process_at_rank(self.remote_offset + peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiSendHandle {
                req: Some(req),
                _buf: buf,
            }
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecvHandle {
            MpiRecvHandle {
                universe: self.universe.clone(),
                source: self.remote_offset + peer as i32,
                tag: tag as i32,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn remote_size(&self) -> usize {
            self.remote_size
        }

        fn barrier(&self) {
            self.world().barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rayon_roundtrip_two_ranks() {
        let comms = RayonComm::world(2);
        let recv_handle = comms[1].irecv(0, 7);
        comms[0].isend(1, 7, Bytes::from_static(&[1, 2, 3, 4]));
        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn receive_blocks_until_send() {
        let comms = RayonComm::world(2);
        std::thread::scope(|s| {
            let rx = s.spawn(|| comms[1].irecv(0, 3).wait());
            std::thread::sleep(std::time::Duration::from_millis(20));
            comms[0].isend(1, 3, Bytes::from(vec![9u8; 16]));
            assert_eq!(rx.join().unwrap(), Some(vec![9u8; 16]));
        });
    }

    #[test]
    fn intercomm_addresses_the_other_group() {
        let (prod, cons) = RayonComm::intercomm(2, 3);
        assert_eq!(prod[0].size(), 2);
        assert_eq!(prod[0].remote_size(), 3);
        assert_eq!(cons[2].remote_size(), 2);
        prod[1].isend(2, 5, Bytes::from_static(b"p1->c2"));
        cons[0].isend(1, 5, Bytes::from_static(b"c0->p1"));
        assert_eq!(cons[2].irecv(1, 5).wait().unwrap(), b"p1->c2");
        assert_eq!(prod[1].irecv(0, 5).wait().unwrap(), b"c0->p1");
    }

    #[test]
    fn block_tags() {
        let t = CommTag::new(0x1000);
        assert_eq!(t.for_block(0).unwrap(), 0x1000);
        assert_eq!(t.for_block(7).unwrap(), 0x1007);
        assert!(matches!(
            t.for_block(CommTag::BLOCK_SPAN),
            Err(RedistError::TagOverflow { .. })
        ));
        assert!(CommTag::new(0xFFF0).for_block(0x20).is_err());
    }

    #[test]
    fn block_tags_stay_within_portable_tag_bound() {
        let t = CommTag::new(0x7FF0);
        assert_eq!(t.for_block(0xF).unwrap(), CommTag::MAX_TAG);
        assert!(matches!(
            t.for_block(0x10),
            Err(RedistError::TagOverflow { base: 0x7FF0, gid: 0x10 })
        ));
        let points = RedistTags::default().points;
        assert!(points.for_block(CommTag::BLOCK_SPAN - 1).unwrap() <= CommTag::MAX_TAG);
    }

    #[test]
    fn default_tag_families_do_not_collide() {
        let t = RedistTags::default();
        let grid = t.grid.base() as usize..t.grid.base() as usize + CommTag::BLOCK_SPAN;
        let points = t.points.base() as usize..t.points.base() as usize + CommTag::BLOCK_SPAN;
        assert!(grid.end <= points.start);
        assert!(points.end <= CommTag::MAX_TAG as usize + 1);
        assert!(!grid.contains(&(t.ready.base() as usize)));
        assert!(!points.contains(&(t.ready.base() as usize)));
    }
}
