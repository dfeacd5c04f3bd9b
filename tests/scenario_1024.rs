mod util;
use util::*;

use block_redist::algs::communicator::{Communicator, RayonComm, RedistTags};
use block_redist::algs::readiness::{Topology, await_ready, signal_ready};
use block_redist::algs::redistribution::{
    recv_grid, recv_points, send_grid, send_points, wait_outstanding,
};
use block_redist::data::{BlockState, CanonicalPayload, Master};
use block_redist::overlap::PointLayout;
use block_redist::topology::{ContiguousAssigner, Decomposition, RegularDecomposer};
use std::thread;

const GLOBAL_POINTS: u64 = 4 * 25;

#[test]
fn decomposition_sizes() {
    let prod = RegularDecomposer::new(1, line(0, 1023), 4).unwrap();
    let cons = RegularDecomposer::new(1, line(0, 1023), 3).unwrap();
    let p: Vec<_> = (0..4).map(|g| prod.core_for(g).unwrap().num_vertices()).collect();
    let c: Vec<_> = (0..3).map(|g| cons.core_for(g).unwrap().num_vertices()).collect();
    assert_eq!(p, vec![256; 4]);
    assert_eq!(c, vec![341, 341, 342]);
    assert_eq!(cons.core_for(0).unwrap(), line(0, 340));
}

#[test]
fn four_producers_to_three_consumers() {
    let prod_dec = RegularDecomposer::new(1, line(0, 1023), 4).unwrap();
    let cons_dec = RegularDecomposer::new(1, line(0, 1023), 3).unwrap();
    let tags = RedistTags::default();
    let (prod, cons) = RayonComm::intercomm(4, 3);

    let consumers = thread::scope(|s| {
        for comm in &prod {
            let (prod_dec, cons_dec) = (&prod_dec, &cons_dec);
            s.spawn(move || {
                let layout = PointLayout::new(GLOBAL_POINTS, 4).unwrap();
                let mut m: Master = Master::generate(
                    prod_dec,
                    comm.rank(),
                    &ContiguousAssigner::new(comm.size(), 4),
                    &layout,
                    &CanonicalPayload,
                )
                .unwrap();
                send_grid(&mut m, cons_dec, comm, tags.grid).unwrap();
                send_points(&mut m, GLOBAL_POINTS, 3, comm, tags.points).unwrap();
                assert!(m.blocks().iter().all(|b| b.state == BlockState::Sending));
                assert!(signal_ready(comm, Topology::Split, &tags).is_none());
                assert!(wait_outstanding(&mut m) > 0);
                assert_eq!(m.outstanding(), 0);
            });
        }
        let hs: Vec<_> = cons
            .iter()
            .map(|comm| {
                let (prod_dec, cons_dec) = (&prod_dec, &cons_dec);
                s.spawn(move || {
                    let layout = PointLayout::new(GLOBAL_POINTS, 3).unwrap();
                    let mut m: Master = Master::generate(
                        cons_dec,
                        comm.rank(),
                        &ContiguousAssigner::new(comm.size(), 3),
                        &layout,
                        &CanonicalPayload,
                    )
                    .unwrap();
                    await_ready(comm, Topology::Split, &tags).unwrap();
                    recv_grid(&mut m, prod_dec, comm, tags.grid, &CanonicalPayload).unwrap();
                    recv_points(&mut m, GLOBAL_POINTS, 4, comm, tags.points, &CanonicalPayload)
                        .unwrap();
                    m
                })
            })
            .collect();
        hs.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    let first = consumers[0].get(0).unwrap();
    assert_eq!(first.recv_grid, (0..=340).collect::<Vec<u64>>());
    assert_eq!(first.state, BlockState::Done);
    // 100 points over 3 blocks: 33, 33, 34
    let last = consumers[2].get(2).unwrap();
    assert_eq!(last.recv_points.len(), 34);
    assert_eq!(last.recv_points.point(0), &[66.0]);
    assert_eq!(last.recv_grid.len(), 342);
    assert_eq!(last.recv_grid.last(), Some(&1023));
}

#[test]
fn scenario_through_workflow() {
    let cfg = config(line(0, 1023), 4, 3);
    let (p, c) = split(&cfg, 4, 3, 0);
    assert_balanced(&p, &c);
    // 1024 values and 68 points, 8 bytes each
    let bytes: usize = c.iter().map(|r| r.received.bytes).sum();
    assert_eq!(bytes, (1024 + 68) * 8);
}
