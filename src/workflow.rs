//! Producer/consumer rounds built from the redistribution engine.
//!
//! A round is: producers issue every send, signal readiness, consumers wait for
//! the signal, receive and validate, producers wait for their sends. Rounds are
//! repeated `ntrials` times over the same blocks.

use crate::algs::communicator::{Communicator, RedistTags, Wait};
use crate::algs::readiness::{Topology, await_ready, signal_ready};
use crate::algs::redistribution::{
    ExchangeStats, recv_grid, recv_points, send_grid, send_points, wait_outstanding,
};
use crate::data::generator::CanonicalPayload;
use crate::data::master::Master;
use crate::overlap::range::PointLayout;
use crate::redist_error::RedistError;
use crate::topology::assigner::ContiguousAssigner;
use crate::topology::bounds::{Bounds, Coordinate};
use crate::topology::decomposition::RegularDecomposer;
use serde::{Deserialize, Serialize};

/// Settings shared by every participant of a redistribution.
///
/// Missing fields take their [`Default`] values when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedistConfig {
    pub dim: usize,
    pub domain: Bounds,
    pub producer_blocks: usize,
    /// Blocks of the consumer that receives the grid.
    pub consumer_blocks: usize,
    /// Blocks of a separate point consumer; `None` sends the points to the
    /// grid consumer.
    pub point_consumer_blocks: Option<usize>,
    /// Points generated by each producer block.
    pub points_per_block: u64,
    /// Ghost width per axis for both decompositions; missing axes are 0.
    pub ghost: Vec<Coordinate>,
    pub topology: Topology,
    pub tags: RedistTags,
    pub ntrials: usize,
}

impl Default for RedistConfig {
    fn default() -> Self {
        Self {
            dim: 3,
            domain: Bounds {
                min: vec![0; 3],
                max: vec![63; 3],
            },
            producer_blocks: 4,
            consumer_blocks: 3,
            point_consumer_blocks: None,
            points_per_block: 1000,
            ghost: Vec::new(),
            topology: Topology::Split,
            tags: RedistTags::default(),
            ntrials: 1,
        }
    }
}

impl RedistConfig {
    /// Total number of points, fixed by the producer side.
    pub fn global_points(&self) -> u64 {
        self.points_per_block * self.producer_blocks as u64
    }

    /// Block count of whoever receives the points.
    pub fn point_consumer_blocks(&self) -> usize {
        self.point_consumer_blocks.unwrap_or(self.consumer_blocks)
    }

    pub fn decomposer(&self, nblocks: usize) -> Result<RegularDecomposer, RedistError> {
        Ok(RegularDecomposer::new(self.dim, self.domain.clone(), nblocks)?.with_ghosts(&self.ghost))
    }

    pub fn producer_decomposer(&self) -> Result<RegularDecomposer, RedistError> {
        self.decomposer(self.producer_blocks)
    }

    pub fn consumer_decomposer(&self) -> Result<RegularDecomposer, RedistError> {
        self.decomposer(self.consumer_blocks)
    }

    /// # Errors
    /// `DimensionMismatch` when `domain` is not `dim`-dimensional, `NoBlocks`
    /// for a zero block count, `InvalidConfig` for zero trials.
    pub fn validate(&self) -> Result<(), RedistError> {
        self.domain.check_dim(self.dim)?;
        if self.producer_blocks == 0 || self.consumer_blocks == 0 || self.point_consumer_blocks == Some(0) {
            return Err(RedistError::NoBlocks);
        }
        if self.ntrials == 0 {
            return Err(RedistError::InvalidConfig("ntrials must be at least 1".into()));
        }
        Ok(())
    }

    fn expect_topology(&self, topology: Topology) -> Result<(), RedistError> {
        if self.topology != topology {
            return Err(RedistError::InvalidConfig(format!(
                "configured for {:?} topology, started as {topology:?}",
                self.topology
            )));
        }
        Ok(())
    }
}

/// Which payloads a consumer group receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerRole {
    Both,
    Grid,
    Points,
}

impl ConsumerRole {
    pub fn grid(self) -> bool {
        matches!(self, ConsumerRole::Both | ConsumerRole::Grid)
    }

    pub fn points(self) -> bool {
        matches!(self, ConsumerRole::Both | ConsumerRole::Points)
    }
}

/// What one process moved over all its rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub trials: usize,
    pub sent: ExchangeStats,
    pub received: ExchangeStats,
}

fn producer_master<C: Communicator>(
    cfg: &RedistConfig,
    comm: &C,
) -> Result<Master<C::SendHandle>, RedistError> {
    let dec = cfg.producer_decomposer()?;
    let layout = PointLayout::new(cfg.global_points(), cfg.producer_blocks)?;
    let assigner = ContiguousAssigner::new(comm.size(), cfg.producer_blocks);
    Master::generate(&dec, comm.rank(), &assigner, &layout, &CanonicalPayload)
}

fn consumer_master<C: Communicator>(
    cfg: &RedistConfig,
    comm: &C,
    role: ConsumerRole,
) -> Result<Master<C::SendHandle>, RedistError> {
    let nblocks = match role {
        ConsumerRole::Points => cfg.point_consumer_blocks(),
        ConsumerRole::Both | ConsumerRole::Grid => cfg.consumer_blocks,
    };
    let dec = cfg.decomposer(nblocks)?;
    let layout = PointLayout::new(cfg.global_points(), nblocks)?;
    let assigner = ContiguousAssigner::new(comm.size(), nblocks);
    Master::generate(&dec, comm.rank(), &assigner, &layout, &CanonicalPayload)
}

fn issue_sends<C: Communicator>(
    master: &mut Master<C::SendHandle>,
    cfg: &RedistConfig,
    grid_comm: &C,
    point_comm: &C,
) -> Result<ExchangeStats, RedistError> {
    let consumer = cfg.consumer_decomposer()?;
    let mut sent = send_grid(master, &consumer, grid_comm, cfg.tags.grid)?;
    sent += send_points(
        master,
        cfg.global_points(),
        cfg.point_consumer_blocks(),
        point_comm,
        cfg.tags.points,
    )?;
    Ok(sent)
}

fn receive<C: Communicator, S>(
    master: &mut Master<S>,
    cfg: &RedistConfig,
    producer: &RegularDecomposer,
    comm: &C,
    role: ConsumerRole,
) -> Result<ExchangeStats, RedistError> {
    let mut received = ExchangeStats::default();
    if role.grid() {
        received += recv_grid(master, producer, comm, cfg.tags.grid, &CanonicalPayload)?;
    }
    if role.points() {
        received += recv_points(
            master,
            cfg.global_points(),
            cfg.producer_blocks,
            comm,
            cfg.tags.points,
            &CanonicalPayload,
        )?;
    }
    Ok(received)
}

/// Producer group of a split topology. `point_comm` connects to a separate
/// point consumer when one is configured.
pub fn run_producer<C: Communicator>(
    cfg: &RedistConfig,
    grid_comm: &C,
    point_comm: Option<&C>,
) -> Result<RoundReport, RedistError> {
    cfg.validate()?;
    cfg.expect_topology(Topology::Split)?;
    if cfg.point_consumer_blocks.is_some() != point_comm.is_some() {
        return Err(RedistError::InvalidConfig(
            "a separate point consumer needs its own channel".into(),
        ));
    }
    let mut master = producer_master(cfg, grid_comm)?;
    let mut report = RoundReport::default();
    for trial in 0..cfg.ntrials {
        report.sent += issue_sends(&mut master, cfg, grid_comm, point_comm.unwrap_or(grid_comm))?;
        signal_ready(grid_comm, Topology::Split, &cfg.tags);
        if let Some(pc) = point_comm {
            signal_ready(pc, Topology::Split, &cfg.tags);
        }
        let drained = wait_outstanding(&mut master);
        log::info!(
            "producer rank {}: trial {trial} complete, {drained} sends",
            grid_comm.rank()
        );
        report.trials += 1;
    }
    Ok(report)
}

/// Consumer group of a split topology.
pub fn run_consumer<C: Communicator>(
    cfg: &RedistConfig,
    comm: &C,
    role: ConsumerRole,
) -> Result<RoundReport, RedistError> {
    cfg.validate()?;
    cfg.expect_topology(Topology::Split)?;
    let producer = cfg.producer_decomposer()?;
    let mut master = consumer_master(cfg, comm, role)?;
    let mut report = RoundReport::default();
    for trial in 0..cfg.ntrials {
        await_ready(comm, Topology::Split, &cfg.tags)?;
        report.received += receive(&mut master, cfg, &producer, comm, role)?;
        log::info!("consumer rank {}: trial {trial} validated", comm.rank());
        report.trials += 1;
    }
    Ok(report)
}

/// Both roles on every rank of one group.
///
/// Consumers receive before producers wait on their sends, so a rank never
/// blocks on a send whose matching receive it has yet to post itself.
pub fn run_shared<C: Communicator>(cfg: &RedistConfig, comm: &C) -> Result<RoundReport, RedistError> {
    cfg.validate()?;
    cfg.expect_topology(Topology::Shared)?;
    let producer = cfg.producer_decomposer()?;
    let mut prod = producer_master(cfg, comm)?;
    let (grid_role, mut point_master) = match cfg.point_consumer_blocks {
        Some(_) => (
            ConsumerRole::Grid,
            Some(consumer_master(cfg, comm, ConsumerRole::Points)?),
        ),
        None => (ConsumerRole::Both, None),
    };
    let mut cons = consumer_master(cfg, comm, grid_role)?;
    let mut report = RoundReport::default();
    for trial in 0..cfg.ntrials {
        report.sent += issue_sends(&mut prod, cfg, comm, comm)?;
        let sentinel = signal_ready(comm, Topology::Shared, &cfg.tags);
        let received = await_ready(comm, Topology::Shared, &cfg.tags).and_then(|()| {
            let mut received = receive(&mut cons, cfg, &producer, comm, grid_role)?;
            if let Some(pm) = point_master.as_mut() {
                received += receive(pm, cfg, &producer, comm, ConsumerRole::Points)?;
            }
            Ok(received)
        });
        wait_outstanding(&mut prod);
        if let Some(h) = sentinel {
            let _ = h.wait();
        }
        report.received += received?;
        log::info!("rank {}: shared trial {trial} validated", comm.rank());
        report.trials += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let cfg = RedistConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.global_points(), 4000);
        assert_eq!(cfg.point_consumer_blocks(), 3);
        assert_eq!(cfg.producer_decomposer().unwrap().divisions().iter().product::<usize>(), 4);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let cfg = RedistConfig {
            dim: 2,
            ..RedistConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(RedistError::DimensionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: RedistConfig = serde_json::from_str(
            r#"{"dim": 1, "domain": {"min": [0], "max": [1023]}, "topology": "shared"}"#,
        )
        .unwrap();
        assert_eq!(cfg.topology, Topology::Shared);
        assert_eq!(cfg.producer_blocks, 4);
        assert_eq!(cfg.tags, RedistTags::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn roles() {
        assert!(ConsumerRole::Both.grid() && ConsumerRole::Both.points());
        assert!(!ConsumerRole::Grid.points());
        assert!(!ConsumerRole::Points.grid());
    }
}
