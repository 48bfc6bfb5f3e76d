// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Parametric physical tree generators.
//!
//! A degree vector `[d0, d1, ..]` (root-most first) describes a uniform
//! tree: the root has `d0` children, each of those has `d1` children, and
//! so on; the deepest level consists of hosts. For example `[2, 3]` yields
//! `root -> ( rack-0 -> ( server-0..2 ) rack-1 -> ( server-3..5 ) )`.

use grove_common::allocation::Allocation;
use grove_common::constants::{DEFAULT_LEVEL_NAME, DEFAULT_LEVEL_NAMES, DEFAULT_ROOT_NAME};
use grove_common::error::{GroveError, GroveResult};
use grove_topology::host::Host;
use grove_topology::physical::{PhysData, PhysicalTree};
use grove_topology::tree::{NodeId, Tree};

/// Build a uniform physical tree with homogeneous hosts of the given
/// capacity, with resources percolated.
pub fn uniform_tree(degree: &[usize], capacity: &[i64]) -> GroveResult<PhysicalTree> {
    if degree.is_empty() || degree.contains(&0) {
        return Err(GroveError::BadInput(format!("invalid degree vector {degree:?}")));
    }
    if capacity.is_empty() {
        return Err(GroveError::BadInput("empty host capacity".to_string()));
    }
    let host_capacity = Allocation::from_values(capacity);
    build_uniform(degree, capacity.len(), |_leaf_index| host_capacity.clone())
}

/// Build a uniform physical tree where host capacity varies by the group
/// a leaf falls under at `group_level` (distance from the root), with
/// resources percolated.
///
/// The outer dimension of `group_capacity` must equal the number of nodes
/// at `group_level`; for `degree = [2, 3]`, `group_level = 1`, and
/// `group_capacity = [[16, 64], [32, 256]]`, servers under the first rack
/// get capacity `[16, 64]` and servers under the second get `[32, 256]`.
pub fn uniform_grouped_tree(
    degree: &[usize],
    group_level: usize,
    group_capacity: &[Vec<i64>],
) -> GroveResult<PhysicalTree> {
    if degree.is_empty() || degree.contains(&0) {
        return Err(GroveError::BadInput(format!("invalid degree vector {degree:?}")));
    }
    let num_groups = group_capacity.len();
    let num_resources = group_capacity.first().map(Vec::len).unwrap_or(0);
    if num_resources == 0 || group_capacity.iter().any(|c| c.len() != num_resources) {
        return Err(GroveError::BadInput("invalid group capacities".to_string()));
    }
    let num_per_level: Vec<usize> = std::iter::once(1)
        .chain(degree.iter().scan(1, |acc, d| {
            *acc *= d;
            Some(*acc)
        }))
        .collect();
    if group_level >= num_per_level.len() || num_groups != num_per_level[group_level] {
        return Err(GroveError::BadInput(format!(
            "expected {} groups at level {group_level}, got {num_groups}",
            num_per_level.get(group_level).copied().unwrap_or(0)
        )));
    }
    let num_leaves = num_per_level[degree.len()];
    let group_size = num_leaves / num_groups;
    let capacities: Vec<Allocation> = group_capacity
        .iter()
        .map(|c| Allocation::from_values(c))
        .collect();
    build_uniform(degree, num_resources, |leaf_index| {
        capacities[leaf_index / group_size].clone()
    })
}

/// Build a flat topology: a root at level 1 over the given leaves at
/// level 0. No hosts are attached and nothing is percolated.
pub fn flat_topology(leaf_ids: &[&str], num_resources: usize) -> GroveResult<PhysicalTree> {
    let mut tree = Tree::new();
    let root = tree
        .insert_root(DEFAULT_ROOT_NAME, PhysData::new(1, num_resources))
        .ok_or_else(|| GroveError::BadInput("cannot create root".to_string()))?;
    for id in leaf_ids {
        if tree.add_child(root, *id, PhysData::new(0, num_resources)).is_none() {
            return Err(GroveError::BadInput(format!("duplicate leaf id {id}")));
        }
    }
    Ok(PhysicalTree::new(tree))
}

fn build_uniform(
    degree: &[usize],
    num_resources: usize,
    capacity_of: impl Fn(usize) -> Allocation,
) -> GroveResult<PhysicalTree> {
    let height = degree.len();
    let mut tree = Tree::new();
    let root = tree
        .insert_root(DEFAULT_ROOT_NAME, PhysData::new(height, num_resources))
        .ok_or_else(|| GroveError::BadInput("cannot create root".to_string()))?;

    let mut frontier = vec![root];
    let mut leaf_names = Vec::new();
    for depth in 1..=height {
        let mut next = Vec::with_capacity(frontier.len() * degree[depth - 1]);
        let mut index = 0;
        for parent in frontier {
            for _ in 0..degree[depth - 1] {
                let name = name_at_level(depth, index, height);
                index += 1;
                let child: Option<NodeId> =
                    tree.add_child(parent, name.clone(), PhysData::new(height - depth, num_resources));
                let child = child
                    .ok_or_else(|| GroveError::BadInput(format!("duplicate node id {name}")))?;
                if depth == height {
                    leaf_names.push(name);
                }
                next.push(child);
            }
        }
        frontier = next;
    }

    let mut ptree = PhysicalTree::new(tree);
    for (leaf_index, name) in leaf_names.iter().enumerate() {
        let host = Host::new(name.clone(), &capacity_of(leaf_index))?;
        ptree.attach_host(host);
    }
    ptree.percolate_resources();
    Ok(ptree)
}

/// Id for a node at a given distance from the root and index within its
/// level.
fn name_at_level(depth: usize, index: usize, height: usize) -> String {
    if depth == 0 {
        return DEFAULT_ROOT_NAME.to_string();
    }
    let level = height - depth;
    let key = match DEFAULT_LEVEL_NAMES.get(level) {
        Some(name) => (*name).to_string(),
        None => format!("{DEFAULT_LEVEL_NAME}{level}"),
    };
    format!("{key}-{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_tree_shape_and_names() {
        let ptree = uniform_tree(&[2, 3], &[16, 256]).unwrap();
        let tree = ptree.tree();

        assert_eq!(tree.height(), 2);
        assert_eq!(
            tree.leaf_ids(),
            vec!["server-0", "server-1", "server-2", "server-3", "server-4", "server-5"]
        );
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).data.level, 2);
        let rack = tree.find("rack-1").unwrap();
        assert_eq!(tree.node(rack).data.level, 1);

        // resources are percolated at build time
        assert_eq!(tree.node(root).data.capacity.values(), &[96, 1536]);
        assert_eq!(ptree.hosts().len(), 6);
    }

    #[test]
    fn test_uniform_tree_rejects_bad_input() {
        assert!(uniform_tree(&[], &[16]).is_err());
        assert!(uniform_tree(&[2, 0], &[16]).is_err());
        assert!(uniform_tree(&[2], &[]).is_err());
    }

    #[test]
    fn test_uniform_grouped_tree_capacities() {
        let groups = vec![vec![16, 64], vec![32, 256]];
        let ptree = uniform_grouped_tree(&[2, 3], 1, &groups).unwrap();

        let first = ptree.host("server-0").unwrap();
        assert_eq!(first.read().capacity().values(), &[16, 64]);
        let last = ptree.host("server-5").unwrap();
        assert_eq!(last.read().capacity().values(), &[32, 256]);

        let tree = ptree.tree();
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).data.capacity.values(), &[144, 960]);
    }

    #[test]
    fn test_uniform_grouped_tree_rejects_mismatch() {
        // 3 groups but only 2 nodes at level 1
        let groups = vec![vec![16], vec![32], vec![64]];
        assert!(uniform_grouped_tree(&[2, 3], 1, &groups).is_err());
        assert!(uniform_grouped_tree(&[2, 3], 1, &[]).is_err());
    }

    #[test]
    fn test_deep_tree_uses_fallback_level_names() {
        let ptree = uniform_tree(&[1; 7], &[1]).unwrap();
        let tree = ptree.tree();
        // 7 levels below the root exhaust the 6 default names
        assert!(tree.find("level6-0").is_some());
        assert!(tree.find("cloud-0").is_some());
    }

    #[test]
    fn test_flat_topology() {
        let ptree = flat_topology(&["h0", "h1", "h2"], 2).unwrap();
        let tree = ptree.tree();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node(tree.root().unwrap()).data.level, 1);
        assert_eq!(tree.leaf_ids(), vec!["h0", "h1", "h2"]);
        assert!(ptree.hosts().is_empty());

        assert!(flat_topology(&["h0", "h0"], 2).is_err());
    }
}
