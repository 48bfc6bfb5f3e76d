// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The physical topology tree.
//!
//! Every node carries per-subtree aggregates ([`PhysData`]): capacity and
//! allocation summed over descendants, the number of group instances that
//! fit, the number already claimed, and a weight (the running ceiling-mean
//! of the contributing host weights). Leaves are backed by [`Host`]s stored
//! behind `Arc<RwLock<_>>` so that subtree projections share hosts by
//! reference.
//!
//! `num_fit` and `num_claimed` are transient fields owned by an active
//! placement; callers reset them between placements.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use grove_common::allocation::Allocation;
use grove_common::constants::DEFAULT_WEIGHT;

use crate::host::Host;
use crate::tree::{NodeId, Tree};

/// A host shared between physical trees.
pub type SharedHost = Arc<RwLock<Host>>;

/// Per-node aggregates of a physical tree.
#[derive(Debug, Clone)]
pub struct PhysData {
    /// Level of the node; leaves are at level 0.
    pub level: usize,
    /// Aggregated resource capacity.
    pub capacity: Allocation,
    /// Aggregated resource allocation.
    pub allocated: Allocation,
    /// Number of group instances that fit in this subtree.
    pub num_fit: i64,
    /// Number of group instances claimed in this subtree.
    pub num_claimed: i64,
    weight: i64,
    total_weight: i64,
    weight_count: i64,
}

impl PhysData {
    /// Create node data at a level with zeroed resources.
    pub fn new(level: usize, num_resources: usize) -> Self {
        Self {
            level,
            capacity: Allocation::zeros(num_resources),
            allocated: Allocation::zeros(num_resources),
            num_fit: 0,
            num_claimed: 0,
            weight: DEFAULT_WEIGHT,
            total_weight: 0,
            weight_count: 0,
        }
    }

    /// The aggregated weight of the node.
    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// Set the weight of the node directly.
    pub fn set_weight(&mut self, weight: i64) {
        self.weight = weight;
    }

    /// Fold one contributing weight into the running ceiling-mean.
    pub fn add_weight(&mut self, weight: i64) {
        self.total_weight += weight;
        self.weight_count += 1;
        self.weight = (self.total_weight + self.weight_count - 1) / self.weight_count;
    }

    /// Resources still available in this subtree.
    pub fn available(&self) -> Allocation {
        let mut available = self.capacity.clone();
        available.subtract(&self.allocated);
        available
    }

    fn reset_resources(&mut self) {
        self.capacity.set_zero();
        self.allocated.set_zero();
        self.total_weight = 0;
        self.weight_count = 0;
    }
}

/// A physical tree topology; leaves are backed by hosts.
#[derive(Debug, Clone)]
pub struct PhysicalTree {
    tree: Tree<PhysData>,
    hosts: HashMap<String, SharedHost>,
}

impl PhysicalTree {
    /// Wrap a built tree; hosts are attached separately.
    pub fn new(tree: Tree<PhysData>) -> Self {
        Self {
            tree,
            hosts: HashMap::new(),
        }
    }

    /// The underlying tree.
    pub fn tree(&self) -> &Tree<PhysData> {
        &self.tree
    }

    /// The underlying tree, mutably.
    pub fn tree_mut(&mut self) -> &mut Tree<PhysData> {
        &mut self.tree
    }

    /// Attach a host to the leaf with the same id.
    /// `false` if no such leaf exists.
    pub fn attach_host(&mut self, host: Host) -> bool {
        self.attach_shared_host(Arc::new(RwLock::new(host)))
    }

    /// Attach an already shared host to the leaf with the same id.
    pub fn attach_shared_host(&mut self, host: SharedHost) -> bool {
        let id = host.read().id().to_string();
        match self.tree.find(&id) {
            Some(node) if self.tree.node(node).is_leaf() => {
                self.hosts.insert(id, host);
                true
            }
            _ => false,
        }
    }

    /// The host backing a leaf, if attached.
    pub fn host(&self, id: &str) -> Option<&SharedHost> {
        self.hosts.get(id)
    }

    /// All attached hosts, keyed by id.
    pub fn hosts(&self) -> &HashMap<String, SharedHost> {
        &self.hosts
    }

    /// Number of resource dimensions (0 for an empty tree).
    pub fn num_resources(&self) -> usize {
        match self.tree.root() {
            Some(root) => self.tree.node(root).data.capacity.len(),
            None => 0,
        }
    }

    /// Zero `num_fit` on every node.
    pub fn reset_num_fit(&mut self) {
        for n in self.tree.bfs() {
            self.tree.node_mut(n).data.num_fit = 0;
        }
    }

    /// Zero `num_claimed` on every node.
    pub fn reset_num_claimed(&mut self) {
        for n in self.tree.bfs() {
            self.tree.node_mut(n).data.num_claimed = 0;
        }
    }

    /// Zero capacity, allocation, and weight accumulators on every node.
    pub fn reset_resources(&mut self) {
        for n in self.tree.bfs() {
            self.tree.node_mut(n).data.reset_resources();
        }
    }

    /// Aggregate capacity, allocation, and weights from the hosts up to the
    /// root. Leaves without an attached host contribute nothing.
    pub fn percolate_resources(&mut self) {
        self.reset_resources();
        for leaf in self.tree.leaves() {
            let leaf_id = self.tree.node(leaf).id().to_string();
            let Some(host) = self.hosts.get(&leaf_id) else {
                continue;
            };
            let (allocated, capacity, weight) = {
                let host = host.read();
                (host.allocated().clone(), host.capacity().clone(), host.weight())
            };
            for (i, node) in self.tree.path_to_root(leaf).into_iter().enumerate() {
                let data = &mut self.tree.node_mut(node).data;
                if i == 0 {
                    data.allocated = allocated.clone();
                    data.capacity = capacity.clone();
                } else {
                    data.allocated.add(&allocated);
                    data.capacity.add(&capacity);
                }
                data.add_weight(weight);
            }
        }
    }

    /// Compute `num_fit` for the given demand on every leaf and propagate
    /// the counts additively up to the root.
    pub fn percolate_num_fit(&mut self, demand: &Allocation) {
        self.reset_num_fit();
        for leaf in self.tree.leaves() {
            let leaf_id = self.tree.node(leaf).id().to_string();
            let Some(host) = self.hosts.get(&leaf_id) else {
                continue;
            };
            let num_fit = {
                let host = host.read();
                demand.number_to_fit(host.allocated(), host.capacity())
            };
            for (i, node) in self.tree.path_to_root(leaf).into_iter().enumerate() {
                let data = &mut self.tree.node_mut(node).data;
                if i == 0 {
                    data.num_fit = num_fit;
                } else {
                    data.num_fit += num_fit;
                }
            }
        }
    }

    /// Add `num_claimed` to `num_fit` on every node, so claimed slots stay
    /// candidates during partial placement.
    pub fn merge_claimed_to_fit(&mut self) {
        for n in self.tree.bfs() {
            let data = &mut self.tree.node_mut(n).data;
            data.num_fit += data.num_claimed;
        }
    }

    /// Assign node levels: the root gets the tree height, decreasing to 0
    /// at the deepest leaves.
    pub fn set_node_levels(&mut self) {
        let Some(root) = self.tree.root() else {
            return;
        };
        let height = self.tree.height();
        self.tree.node_mut(root).data.level = height;
        for n in self.tree.bfs() {
            let level = self.tree.node(n).data.level;
            for child in self.tree.node(n).children().to_vec() {
                self.tree.node_mut(child).data.level = level.saturating_sub(1);
            }
        }
    }

    /// Project the tree onto a subset of its leaves: the copy contains
    /// exactly the ancestors of the given leaf ids, with levels, weights,
    /// and node values carried over and hosts shared by reference.
    /// Unknown or non-leaf ids are silently skipped.
    pub fn copy_by_leaf_ids(&self, leaf_ids: &[String]) -> PhysicalTree {
        let num_resources = self.num_resources();
        let mut out = Tree::new();
        let mut hosts = HashMap::new();

        for id in leaf_ids {
            let Some(leaf) = self.tree.find(id) else {
                continue;
            };
            if !self.tree.node(leaf).is_leaf() {
                continue;
            }
            let mut prev: Option<NodeId> = None;
            for orig in self.tree.path_to_root(leaf).into_iter().rev() {
                let node = self.tree.node(orig);
                if let Some(existing) = out.find(node.id()) {
                    prev = Some(existing);
                    continue;
                }
                let mut data = PhysData::new(node.data.level, num_resources);
                data.set_weight(node.data.weight());
                let copy = match prev {
                    None => out.insert_root(node.id().to_string(), data),
                    Some(parent) => out.add_child(parent, node.id().to_string(), data),
                };
                if let Some(copy) = copy {
                    let value = node.value();
                    out.node_mut(copy).set_value(value);
                    prev = Some(copy);
                }
            }
            if let Some(host) = self.hosts.get(id) {
                hosts.insert(id.clone(), Arc::clone(host));
            }
        }
        PhysicalTree { tree: out, hosts }
    }
}

impl fmt::Display for PhysicalTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "physical tree: {}", self.tree)?;
        for n in self.tree.bfs() {
            let node = self.tree.node(n);
            let d = &node.data;
            writeln!(
                f,
                "  {}: level={}; weight={}; cap={}; alloc={}; claimed={}",
                node.id(),
                d.level,
                d.weight(),
                d.capacity,
                d.allocated,
                d.num_claimed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> ( rack-0 -> ( server-0 server-1 ) rack-1 -> ( server-2 ) )
    fn make_tree() -> PhysicalTree {
        let mut tree = Tree::new();
        let root = tree.insert_root("root", PhysData::new(2, 2)).unwrap();
        let rack0 = tree.add_child(root, "rack-0", PhysData::new(1, 2)).unwrap();
        let rack1 = tree.add_child(root, "rack-1", PhysData::new(1, 2)).unwrap();
        for (rack, name) in [(rack0, "server-0"), (rack0, "server-1"), (rack1, "server-2")] {
            tree.add_child(rack, name, PhysData::new(0, 2)).unwrap();
        }
        let mut ptree = PhysicalTree::new(tree);
        let capacity = Allocation::from_values(&[16, 256]);
        for name in ["server-0", "server-1", "server-2"] {
            assert!(ptree.attach_host(Host::new(name, &capacity).unwrap()));
        }
        ptree
    }

    #[test]
    fn test_percolate_resources_conserves_sums() {
        let mut ptree = make_tree();
        ptree
            .host("server-0")
            .unwrap()
            .write()
            .set_allocated(Allocation::from_values(&[4, 32]));
        ptree.percolate_resources();

        let tree = ptree.tree();
        for n in tree.bfs() {
            let node = tree.node(n);
            if node.is_leaf() {
                continue;
            }
            let mut capacity = Allocation::zeros(2);
            let mut allocated = Allocation::zeros(2);
            for child in node.children() {
                capacity.add(&tree.node(*child).data.capacity);
                allocated.add(&tree.node(*child).data.allocated);
            }
            assert!(capacity.equal(&node.data.capacity), "capacity at {}", node.id());
            assert!(allocated.equal(&node.data.allocated), "allocated at {}", node.id());
        }
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).data.capacity.values(), &[48, 768]);
        assert_eq!(tree.node(root).data.allocated.values(), &[4, 32]);
    }

    #[test]
    fn test_percolate_weight_is_ceiling_mean() {
        let mut ptree = make_tree();
        ptree.host("server-0").unwrap().write().set_weight(1);
        ptree.host("server-1").unwrap().write().set_weight(2);
        ptree.host("server-2").unwrap().write().set_weight(5);
        ptree.percolate_resources();

        let tree = ptree.tree();
        let rack0 = tree.find("rack-0").unwrap();
        // ceil((1 + 2) / 2) = 2
        assert_eq!(tree.node(rack0).data.weight(), 2);
        let root = tree.root().unwrap();
        // ceil((1 + 2 + 5) / 3) = 3
        assert_eq!(tree.node(root).data.weight(), 3);

        // re-percolation publishes a fresh mean
        ptree.host("server-2").unwrap().write().set_weight(1);
        ptree.percolate_resources();
        let tree = ptree.tree();
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).data.weight(), 2);
    }

    #[test]
    fn test_percolate_num_fit() {
        let mut ptree = make_tree();
        ptree
            .host("server-0")
            .unwrap()
            .write()
            .set_allocated(Allocation::from_values(&[8, 64]));
        let demand = Allocation::from_values(&[4, 32]);
        ptree.percolate_num_fit(&demand);

        let tree = ptree.tree();
        assert_eq!(tree.node(tree.find("server-0").unwrap()).data.num_fit, 2);
        assert_eq!(tree.node(tree.find("server-1").unwrap()).data.num_fit, 4);
        assert_eq!(tree.node(tree.find("rack-0").unwrap()).data.num_fit, 6);
        assert_eq!(tree.node(tree.root().unwrap()).data.num_fit, 10);
    }

    #[test]
    fn test_merge_claimed_to_fit() {
        let mut ptree = make_tree();
        let s0 = ptree.tree().find("server-0").unwrap();
        ptree.tree_mut().node_mut(s0).data.num_claimed = 2;
        ptree.merge_claimed_to_fit();
        assert_eq!(ptree.tree().node(s0).data.num_fit, 2);
    }

    #[test]
    fn test_set_node_levels() {
        let mut ptree = make_tree();
        // scramble levels, then restore
        for n in ptree.tree().bfs() {
            ptree.tree_mut().node_mut(n).data.level = 7;
        }
        ptree.set_node_levels();

        let tree = ptree.tree();
        assert_eq!(tree.node(tree.root().unwrap()).data.level, 2);
        assert_eq!(tree.node(tree.find("rack-1").unwrap()).data.level, 1);
        assert_eq!(tree.node(tree.find("server-2").unwrap()).data.level, 0);
    }

    #[test]
    fn test_copy_by_leaf_ids() {
        let mut ptree = make_tree();
        ptree.host("server-1").unwrap().write().set_weight(7);
        ptree.percolate_resources();

        let copy = ptree.copy_by_leaf_ids(&[
            "server-1".to_string(),
            "missing".to_string(),
            "server-2".to_string(),
        ]);

        assert_eq!(copy.tree().node_ids(), vec!["rack-0", "rack-1", "root", "server-1", "server-2"]);
        let s1 = copy.tree().find("server-1").unwrap();
        assert_eq!(copy.tree().node(s1).data.level, 0);
        assert_eq!(copy.tree().node(s1).data.weight(), 7);

        // hosts are shared by reference with the original
        copy.host("server-1")
            .unwrap()
            .write()
            .set_allocated(Allocation::from_values(&[1, 1]));
        assert_eq!(
            ptree.host("server-1").unwrap().read().allocated().values(),
            &[1, 1]
        );
    }
}
