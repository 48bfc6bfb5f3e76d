// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Synthetic background load and weights for demo topologies.

use rand::Rng;

use grove_common::allocation::Allocation;
use grove_common::constants::{MAX_WEIGHT, MIN_WEIGHT};
use grove_topology::physical::PhysicalTree;

/// Place random background load on all hosts of a tree.
///
/// - `load_factor`: target overall utilization
/// - `alpha`: probability of a completely full host
/// - `beta`: probability of an idle host
/// - `cov`: coefficient of variation of the per-host utilization
///
/// Returns the average utilization targeted for the non-extreme hosts.
pub fn place_background_load<R: Rng>(
    ptree: &PhysicalTree,
    rng: &mut R,
    load_factor: f64,
    alpha: f64,
    beta: f64,
    cov: f64,
) -> f64 {
    let avg = average_load(load_factor, alpha, beta);
    for host in ptree.hosts().values() {
        let x: f64 = rng.gen();
        let utilization = if x < alpha {
            1.0
        } else if x < alpha + beta {
            0.0
        } else {
            (avg * (standard_normal(rng) * cov + 1.0)).clamp(0.0, 1.0)
        };

        let mut host = host.write();
        let values: Vec<i64> = host
            .capacity()
            .values()
            .iter()
            .map(|c| (((utilization * *c as f64).round()) as i64).clamp(0, *c))
            .collect();
        host.set_allocated(Allocation::from_values(&values));
    }
    avg
}

/// Assign uniformly random weights to all hosts of a tree.
pub fn place_random_weights<R: Rng>(ptree: &PhysicalTree, rng: &mut R) {
    for host in ptree.hosts().values() {
        host.write().set_weight(rng.gen_range(MIN_WEIGHT..=MAX_WEIGHT));
    }
}

/// Average utilization of the hosts that are neither full nor idle.
pub fn average_load(load_factor: f64, alpha: f64, beta: f64) -> f64 {
    let mut avg = 0.0;
    if alpha + beta < 1.0 {
        avg = (load_factor - alpha) / (1.0 - (alpha + beta));
    }
    avg.clamp(0.0, 1.0)
}

/// Standard normal sample via the Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_builder::uniform_tree;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_average_load() {
        assert_eq!(average_load(0.5, 0.0, 0.0), 0.5);
        assert_eq!(average_load(0.5, 0.5, 0.5), 0.0);
        // clamped into [0, 1]
        assert_eq!(average_load(0.1, 0.5, 0.0), 0.0);
        assert_eq!(average_load(1.0, 0.0, 0.5), 1.0);
    }

    #[test]
    fn test_background_load_within_capacity() {
        let ptree = uniform_tree(&[2, 4], &[16, 256]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        place_background_load(&ptree, &mut rng, 0.6, 0.1, 0.1, 0.3);

        for host in ptree.hosts().values() {
            let host = host.read();
            assert!(host.allocated().less_or_equal(host.capacity()));
            assert!(host.allocated().values().iter().all(|v| *v >= 0));
        }
    }

    #[test]
    fn test_random_weights_in_bounds() {
        let ptree = uniform_tree(&[2, 2], &[16]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        place_random_weights(&ptree, &mut rng);

        for host in ptree.hosts().values() {
            let weight = host.read().weight();
            assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&weight));
        }
    }
}
