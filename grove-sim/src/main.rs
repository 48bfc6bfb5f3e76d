// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Grove placement demo.
//!
//! Builds a uniform topology, sprinkles random background load and weights
//! over the hosts, places a group under pack/spread constraints with a
//! selectable policy, claims and unclaims it, and reports box-whisker
//! statistics of the placement time over repeated runs.

mod load;
mod stats;

use std::time::Instant;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use grove_builder::uniform_tree;
use grove_common::allocation::Allocation;
use grove_placement::{Affinity, LevelConstraint, Placer, PlacementGroup, Policy};

use crate::stats::BoxWhisker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Default,
    ByWeight,
    ByWeightProduct,
    ByFitWeightProduct,
    ByMinWeightedAvailability,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Default => Policy::Default,
            PolicyArg::ByWeight => Policy::ByWeight,
            PolicyArg::ByWeightProduct => Policy::ByWeightProduct,
            PolicyArg::ByFitWeightProduct => Policy::ByFitWeightProduct,
            PolicyArg::ByMinWeightedAvailability => Policy::ByMinWeightedAvailability,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "grove-sim", about = "Grove placement demo")]
struct Args {
    /// Tree degrees, root-most first (e.g. 4,8)
    #[arg(long, value_delimiter = ',', default_value = "4,8")]
    degrees: Vec<usize>,

    /// Host capacity per resource (e.g. 16,256)
    #[arg(long, value_delimiter = ',', default_value = "16,256")]
    capacity: Vec<i64>,

    /// Per-instance demand (e.g. 4,32)
    #[arg(long, value_delimiter = ',', default_value = "4,32")]
    demand: Vec<i64>,

    /// Number of instances in the group
    #[arg(long, default_value_t = 8)]
    group_size: usize,

    /// Child selection policy
    #[arg(long, value_enum, default_value_t = PolicyArg::Default)]
    policy: PolicyArg,

    /// Target overall utilization of the background load
    #[arg(long, default_value_t = 0.5)]
    load_factor: f64,

    /// Probability of a completely full host
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Probability of an idle host
    #[arg(long, default_value_t = 0.05)]
    beta: f64,

    /// Coefficient of variation of the per-host utilization
    #[arg(long, default_value_t = 0.3)]
    cov: f64,

    /// Seed for the load and weight synthesis
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of timed placement runs
    #[arg(long, default_value_t = 10)]
    runs: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut ptree = uniform_tree(&args.degrees, &args.capacity)?;
    load::place_random_weights(&ptree, &mut rng);
    let avg = load::place_background_load(
        &ptree,
        &mut rng,
        args.load_factor,
        args.alpha,
        args.beta,
        args.cov,
    );
    ptree.percolate_resources();
    println!(
        "topology: {} hosts over degrees {:?}; target load {avg:.2}",
        ptree.hosts().len(),
        args.degrees
    );

    let mut pg = PlacementGroup::new(
        "pg0",
        args.group_size,
        Allocation::from_values(&args.demand),
    )?;
    pg.add_level_constraint(LevelConstraint::new("lc-pack", 1, Affinity::Pack, false)?);
    pg.add_level_constraint(LevelConstraint::new("lc-spread", 0, Affinity::Spread, false)?);

    let policy = Policy::from(args.policy);
    let mut timings = BoxWhisker::new(args.runs.max(1));
    for run in 0..args.runs.max(1) {
        let start = Instant::now();
        let result = Placer::new(&mut ptree).place_group_with(&mut pg, policy);
        timings.add_sample(start.elapsed().as_micros() as i64);
        match result {
            Ok(()) if run == 0 => {
                if let Some(ltree) = pg.logical_tree() {
                    println!("\nplacement ({policy:?}):\n{ltree}");
                }
            }
            Ok(()) => {}
            Err(e) => {
                println!("placement failed: {e}");
                return Ok(());
            }
        }
    }

    if pg.claim_all(&mut ptree) {
        println!("claimed {} instances; busiest hosts:", pg.size());
        let mut hosts: Vec<String> = ptree
            .hosts()
            .values()
            .filter(|h| h.read().num_hosted() > 0)
            .map(|h| h.read().to_string())
            .collect();
        hosts.sort();
        for line in hosts {
            println!("  {line}");
        }
        pg.unclaim_all(&mut ptree);
    }

    timings.calculate();
    println!("\nplacement time (us): {timings}");
    Ok(())
}
