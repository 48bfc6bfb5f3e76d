// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The logical placement tree.
//!
//! A logical tree mirrors the subset of a physical tree where a group was
//! placed. Node ids match the corresponding physical node ids; each node
//! carries the instance count placed in its subtree and the portion of that
//! count already claimed (materialized on hosts).

use std::fmt;

use crate::physical::PhysicalTree;
use crate::tree::Tree;

/// Per-node counters of a logical tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalData {
    /// Instances placed in the subtree rooted at this node.
    pub count: i64,
    /// Instances already claimed in the subtree rooted at this node.
    pub claimed: i64,
}

/// A logical tree topology describing one group placement.
#[derive(Debug, Clone)]
pub struct LogicalTree {
    tree: Tree<LogicalData>,
}

impl LogicalTree {
    /// Wrap a built tree of logical counters.
    pub fn new(tree: Tree<LogicalData>) -> Self {
        Self { tree }
    }

    /// The underlying tree.
    pub fn tree(&self) -> &Tree<LogicalData> {
        &self.tree
    }

    /// The underlying tree, mutably.
    pub fn tree_mut(&mut self) -> &mut Tree<LogicalData> {
        &mut self.tree
    }

    /// Total count at the root (0 for an empty tree).
    pub fn root_count(&self) -> i64 {
        match self.tree.root() {
            Some(root) => self.tree.node(root).data.count,
            None => 0,
        }
    }

    /// Total claimed at the root (0 for an empty tree).
    pub fn root_claimed(&self) -> i64 {
        match self.tree.root() {
            Some(root) => self.tree.node(root).data.claimed,
            None => 0,
        }
    }

    /// Zero the claimed counters, optionally including the leaves.
    pub fn reset_claimed(&mut self, include_leaves: bool) {
        for n in self.tree.bfs() {
            if !include_leaves && self.tree.node(n).is_leaf() {
                continue;
            }
            self.tree.node_mut(n).data.claimed = 0;
        }
    }

    /// Recompute the claimed counters of internal nodes from the leaves.
    pub fn percolate_claimed(&mut self) {
        self.reset_claimed(false);
        for leaf in self.tree.leaves() {
            let claimed = self.tree.node(leaf).data.claimed;
            for (i, node) in self.tree.path_to_root(leaf).into_iter().enumerate() {
                if i > 0 {
                    self.tree.node_mut(node).data.claimed += claimed;
                }
            }
        }
    }

    /// Copy every node's claimed counter into the `num_claimed` field of
    /// the physical node with the same id.
    pub fn set_physical_claimed(&self, ptree: &mut PhysicalTree) {
        for n in self.tree.bfs() {
            let node = self.tree.node(n);
            if let Some(p) = ptree.tree().find(node.id()) {
                ptree.tree_mut().node_mut(p).data.num_claimed = node.data.claimed;
            }
        }
    }
}

impl fmt::Display for LogicalTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "logical tree: {}", self.tree)?;
        for n in self.tree.bfs() {
            let node = self.tree.node(n);
            writeln!(
                f,
                "  {}: count={}; claimed={}",
                node.id(),
                node.data.count,
                node.data.claimed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::{PhysData, PhysicalTree};

    /// root -> ( rack-0 -> ( server-0 server-1 ) )
    fn make_ltree() -> LogicalTree {
        let mut tree = Tree::new();
        let root = tree
            .insert_root("root", LogicalData { count: 3, claimed: 0 })
            .unwrap();
        let rack = tree
            .add_child(root, "rack-0", LogicalData { count: 3, claimed: 0 })
            .unwrap();
        tree.add_child(rack, "server-0", LogicalData { count: 2, claimed: 2 })
            .unwrap();
        tree.add_child(rack, "server-1", LogicalData { count: 1, claimed: 1 })
            .unwrap();
        LogicalTree::new(tree)
    }

    #[test]
    fn test_percolate_claimed() {
        let mut ltree = make_ltree();
        ltree.percolate_claimed();

        assert_eq!(ltree.root_claimed(), 3);
        let rack = ltree.tree().find("rack-0").unwrap();
        assert_eq!(ltree.tree().node(rack).data.claimed, 3);
        // leaves keep their own counters
        let s0 = ltree.tree().find("server-0").unwrap();
        assert_eq!(ltree.tree().node(s0).data.claimed, 2);
    }

    #[test]
    fn test_reset_claimed() {
        let mut ltree = make_ltree();
        ltree.percolate_claimed();

        ltree.reset_claimed(false);
        assert_eq!(ltree.root_claimed(), 0);
        let s0 = ltree.tree().find("server-0").unwrap();
        assert_eq!(ltree.tree().node(s0).data.claimed, 2);

        ltree.reset_claimed(true);
        assert_eq!(ltree.tree().node(s0).data.claimed, 0);
    }

    #[test]
    fn test_set_physical_claimed() {
        let mut ltree = make_ltree();
        ltree.percolate_claimed();

        let mut tree = Tree::new();
        let root = tree.insert_root("root", PhysData::new(2, 1)).unwrap();
        let rack = tree.add_child(root, "rack-0", PhysData::new(1, 1)).unwrap();
        tree.add_child(rack, "server-0", PhysData::new(0, 1)).unwrap();
        tree.add_child(rack, "server-1", PhysData::new(0, 1)).unwrap();
        tree.add_child(rack, "server-2", PhysData::new(0, 1)).unwrap();
        let mut ptree = PhysicalTree::new(tree);

        ltree.set_physical_claimed(&mut ptree);
        let tree = ptree.tree();
        assert_eq!(tree.node(tree.root().unwrap()).data.num_claimed, 3);
        assert_eq!(tree.node(tree.find("server-0").unwrap()).data.num_claimed, 2);
        // physical nodes outside the placement are untouched
        assert_eq!(tree.node(tree.find("server-2").unwrap()).data.num_claimed, 0);
    }
}
