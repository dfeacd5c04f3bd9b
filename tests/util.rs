#![allow(dead_code)]
use block_redist::algs::communicator::RayonComm;
use block_redist::algs::readiness::Topology;
use block_redist::topology::bounds::Bounds;
use block_redist::workflow::{
    ConsumerRole, RedistConfig, RoundReport, run_consumer, run_producer, run_shared,
};
use std::thread;

pub fn line(lo: i64, hi: i64) -> Bounds {
    Bounds::new(vec![lo], vec![hi]).unwrap()
}

pub fn extents(e: &[i64]) -> Bounds {
    Bounds::from_extents(e).unwrap()
}

/// Config for a `dim`-dimensional box with the given block counts.
pub fn config(domain: Bounds, producer_blocks: usize, consumer_blocks: usize) -> RedistConfig {
    RedistConfig {
        dim: domain.dim(),
        domain,
        producer_blocks,
        consumer_blocks,
        points_per_block: 17,
        ..RedistConfig::default()
    }
}

/// Run a split round with `np` producer and `nc` consumer threads.
/// A separate point consumer gets `npc` threads when configured.
pub fn split(cfg: &RedistConfig, np: usize, nc: usize, npc: usize) -> (Vec<RoundReport>, Vec<RoundReport>) {
    assert_eq!(cfg.topology, Topology::Split);
    let (prod, cons) = RayonComm::intercomm(np, nc);
    let (prod_pts, cons_pts): (Vec<Option<RayonComm>>, Vec<RayonComm>) =
        match cfg.point_consumer_blocks {
            Some(_) => {
                let (a, b) = RayonComm::intercomm(np, npc);
                (a.into_iter().map(Some).collect(), b)
            }
            None => ((0..np).map(|_| None).collect(), Vec::new()),
        };
    let grid_role = if cfg.point_consumer_blocks.is_some() {
        ConsumerRole::Grid
    } else {
        ConsumerRole::Both
    };
    thread::scope(|s| {
        let producers: Vec<_> = prod
            .iter()
            .zip(&prod_pts)
            .map(|(g, p)| s.spawn(move || run_producer(cfg, g, p.as_ref()).unwrap()))
            .collect();
        let consumers: Vec<_> = cons
            .iter()
            .map(|c| s.spawn(move || run_consumer(cfg, c, grid_role).unwrap()))
            .collect();
        let point_consumers: Vec<_> = cons_pts
            .iter()
            .map(|c| s.spawn(move || run_consumer(cfg, c, ConsumerRole::Points).unwrap()))
            .collect();
        let p = producers.into_iter().map(|h| h.join().unwrap()).collect();
        let mut c: Vec<_> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
        c.extend(point_consumers.into_iter().map(|h| h.join().unwrap()));
        (p, c)
    })
}

/// Run a shared round on `n` threads.
pub fn shared(cfg: &RedistConfig, n: usize) -> Vec<RoundReport> {
    assert_eq!(cfg.topology, Topology::Shared);
    let comms = RayonComm::world(n);
    thread::scope(|s| {
        let hs: Vec<_> = comms
            .iter()
            .map(|c| s.spawn(move || run_shared(cfg, c).unwrap()))
            .collect();
        hs.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Bytes sent must equal bytes received.
pub fn assert_balanced(sent: &[RoundReport], received: &[RoundReport]) {
    let out: usize = sent.iter().map(|r| r.sent.bytes).sum();
    let inn: usize = received.iter().map(|r| r.received.bytes).sum();
    assert_eq!(out, inn, "sent {out} bytes, received {inn}");
    let fo: usize = sent.iter().map(|r| r.sent.fragments).sum();
    let fi: usize = received.iter().map(|r| r.received.fragments).sum();
    assert_eq!(fo, fi);
}
