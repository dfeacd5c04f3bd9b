//! Readiness rendezvous between producers and consumers.
//!
//! Producers signal once every send of a round has been issued; consumers wait
//! for that signal before posting their first receive. With disjoint groups the
//! signal is a barrier over the connecting channel. When one process plays both
//! roles the barrier runs over the shared group and each rank then posts a
//! sentinel to itself, which its consumer half receives.

use crate::algs::communicator::{Communicator, RedistTags, Wait};
use crate::algs::wire::{WireSentinel, cast_slice, expect_exact_len};
use crate::redist_error::RedistError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How producer and consumer roles map onto processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Producers and consumers are disjoint groups joined by one channel.
    #[default]
    Split,
    /// Every process runs a producer and a consumer over a single group.
    Shared,
}

/// Producer side. In [`Topology::Shared`] the returned handle carries the
/// sentinel; wait on it after the consumer half has run [`await_ready`].
pub fn signal_ready<C: Communicator>(
    comm: &C,
    topology: Topology,
    tags: &RedistTags,
) -> Option<C::SendHandle> {
    comm.barrier();
    match topology {
        Topology::Split => {
            log::debug!("rank {}: producer ready (barrier)", comm.rank());
            None
        }
        Topology::Shared => {
            let rank = comm.rank();
            let sentinel = WireSentinel::new(rank);
            let buf = Bytes::copy_from_slice(cast_slice(std::slice::from_ref(&sentinel)));
            log::debug!("rank {rank}: producer ready (sentinel)");
            Some(comm.isend(rank, tags.ready.as_u16(), buf))
        }
    }
}

/// Consumer side: returns once the producers of this round have signalled.
///
/// # Errors
/// `MissingSentinel` when the self-addressed sentinel does not arrive intact.
pub fn await_ready<C: Communicator>(
    comm: &C,
    topology: Topology,
    tags: &RedistTags,
) -> Result<(), RedistError> {
    match topology {
        Topology::Split => {
            comm.barrier();
            Ok(())
        }
        Topology::Shared => {
            let rank = comm.rank();
            let data = comm
                .irecv(rank, tags.ready.as_u16())
                .wait()
                .ok_or(RedistError::MissingSentinel { rank })?;
            expect_exact_len(data.len(), std::mem::size_of::<WireSentinel>())
                .map_err(|_| RedistError::MissingSentinel { rank })?;
            log::debug!("rank {rank}: consumer released");
            Ok(())
        }
    }
}
