mod util;
use util::*;

use block_redist::overlap::{PointLayout, incoming_fragments, outgoing_fragments, point_overlaps};
use block_redist::topology::{Decomposition, RegularDecomposer};
use block_redist::workflow::RedistConfig;

#[test]
fn empty_consumer_blocks_have_no_fragments() {
    // 3 vertices over 4 consumer blocks: the leading three are empty
    let prod = RegularDecomposer::new(1, line(0, 2), 3).unwrap();
    let cons = RegularDecomposer::new(1, line(0, 2), 4).unwrap();
    for j in 0..3 {
        let b = cons.bounds_for(j).unwrap();
        assert!(b.is_empty());
        assert!(incoming_fragments(&b, &prod).unwrap().is_empty());
    }
    assert_eq!(cons.core_for(3).unwrap(), line(0, 2));
    for i in 0..3 {
        let frags = outgoing_fragments(&prod.core_for(i).unwrap(), &cons).unwrap();
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].peer, 3);
    }
}

#[test]
fn fewer_points_than_blocks() {
    let layout = PointLayout::new(2, 4).unwrap();
    for g in 0..3 {
        assert!(layout.range(g).unwrap().is_empty());
    }
    let peer = PointLayout::new(2, 3).unwrap();
    let own = layout.range(3).unwrap();
    let ovs = point_overlaps(own, &peer).unwrap();
    assert_eq!(ovs.len(), 1);
    assert_eq!(ovs[0].peer, 2);
}

#[test]
fn three_producers_four_consumers_complete() {
    let cfg = RedistConfig {
        points_per_block: 1,
        ..config(line(0, 2), 3, 4)
    };
    let (p, c) = split(&cfg, 3, 4, 0);
    assert_balanced(&p, &c);
    // only the last consumer block receives anything
    assert_eq!(c[..3].iter().map(|r| r.received.fragments).sum::<usize>(), 0);
    assert_eq!(c[3].received.fragments, 3 + 3);
}

#[test]
fn no_points_at_all() {
    let cfg = RedistConfig {
        points_per_block: 0,
        ..config(extents(&[5, 5]), 2, 3)
    };
    let (p, c) = split(&cfg, 2, 3, 0);
    assert_balanced(&p, &c);
    let bytes: usize = c.iter().map(|r| r.received.bytes).sum();
    assert_eq!(bytes, 25 * 8);
}
