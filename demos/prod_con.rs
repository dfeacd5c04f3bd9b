//! Producer/consumer redistribution with every rank on its own thread.
//!
//! ```text
//! cargo run --example prod_con                # built-in defaults
//! cargo run --example prod_con -- run.json    # settings from a file
//! ```
//!
//! The JSON file holds the `RedistConfig` fields plus `producer_ranks`,
//! `consumer_ranks` and `point_consumer_ranks`; missing fields keep their
//! defaults. Any failure on any rank stops the whole run with exit code 1.

use block_redist::prelude::*;
use serde::Deserialize;
use std::thread;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    producer_ranks: usize,
    consumer_ranks: usize,
    /// Only used when `point_consumer_blocks` is set.
    point_consumer_ranks: usize,
    #[serde(flatten)]
    redist: RedistConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producer_ranks: 2,
            consumer_ranks: 3,
            point_consumer_ranks: 2,
            redist: RedistConfig::default(),
        }
    }
}

fn load(path: &str) -> Result<DemoConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// A rank that fails leaves its peers blocked, so stop the process.
fn or_exit(who: &str, res: Result<RoundReport, RedistError>) -> RoundReport {
    res.unwrap_or_else(|e| {
        eprintln!("{who}: {e}");
        std::process::exit(1)
    })
}

fn run_split(cfg: &DemoConfig) -> Vec<(String, RoundReport)> {
    let rc = &cfg.redist;
    let (prod, cons) = RayonComm::intercomm(cfg.producer_ranks, cfg.consumer_ranks);
    let (prod_pts, cons_pts): (Vec<Option<RayonComm>>, Vec<RayonComm>) = match rc.point_consumer_blocks {
        Some(_) => {
            let (a, b) = RayonComm::intercomm(cfg.producer_ranks, cfg.point_consumer_ranks);
            (a.into_iter().map(Some).collect(), b)
        }
        None => (vec![None; cfg.producer_ranks], Vec::new()),
    };
    let grid_role = match rc.point_consumer_blocks {
        Some(_) => ConsumerRole::Grid,
        None => ConsumerRole::Both,
    };
    thread::scope(|s| {
        let mut handles = Vec::new();
        for (g, p) in prod.iter().zip(&prod_pts) {
            let who = format!("producer {}", g.rank());
            handles.push(s.spawn(move || {
                let r = or_exit(&who, run_producer(rc, g, p.as_ref()));
                (who, r)
            }));
        }
        for c in &cons {
            let who = format!("consumer {}", c.rank());
            handles.push(s.spawn(move || {
                let r = or_exit(&who, run_consumer(rc, c, grid_role));
                (who, r)
            }));
        }
        for c in &cons_pts {
            let who = format!("point consumer {}", c.rank());
            handles.push(s.spawn(move || {
                let r = or_exit(&who, run_consumer(rc, c, ConsumerRole::Points));
                (who, r)
            }));
        }
        handles.into_iter().filter_map(|h| h.join().ok()).collect()
    })
}

fn run_time_shared(cfg: &DemoConfig) -> Vec<(String, RoundReport)> {
    let rc = &cfg.redist;
    let comms = RayonComm::world(cfg.producer_ranks);
    thread::scope(|s| {
        let handles: Vec<_> = comms
            .iter()
            .map(|c| {
                let who = format!("rank {}", c.rank());
                s.spawn(move || {
                    let r = or_exit(&who, run_shared(rc, c));
                    (who, r)
                })
            })
            .collect();
        handles.into_iter().filter_map(|h| h.join().ok()).collect()
    })
}

fn main() {
    let cfg = match std::env::args().nth(1) {
        Some(path) => load(&path).unwrap_or_else(|e| {
            eprintln!("cannot read {path}: {e}");
            std::process::exit(2)
        }),
        None => DemoConfig::default(),
    };
    if let Err(e) = cfg.redist.validate() {
        eprintln!("{e}");
        std::process::exit(2);
    }
    let reports = match cfg.redist.topology {
        Topology::Split => run_split(&cfg),
        Topology::Shared => run_time_shared(&cfg),
    };
    for (who, r) in &reports {
        println!(
            "{who:>18}: {} trials, sent {} fragments / {} bytes, received {} fragments / {} bytes",
            r.trials, r.sent.fragments, r.sent.bytes, r.received.fragments, r.received.bytes
        );
    }
    println!(
        "{} producer blocks -> {} consumer blocks over {}: all received data validated",
        cfg.redist.producer_blocks, cfg.redist.consumer_blocks, cfg.redist.domain
    );
}
