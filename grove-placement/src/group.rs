// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Placement groups.
//!
//! A [`PlacementGroup`] aggregates a group size, the per-instance demand,
//! the per-level constraints, the owned instances, and (once placed) the
//! resulting logical tree. Claiming materializes a placement by actually
//! allocating instances onto hosts; unclaiming reverses it.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use grove_common::allocation::Allocation;
use grove_common::error::{GroveError, GroveResult};
use grove_topology::instance::InstanceGroup;
use grove_topology::logical::LogicalTree;
use grove_topology::physical::PhysicalTree;

use crate::constraint::LevelConstraint;

/// A group of homogeneous instances to be placed as one unit.
#[derive(Debug, Clone)]
pub struct PlacementGroup {
    id: String,
    size: usize,
    demand: Allocation,
    // constraints keyed by level, with an id index for removal by id
    constraints: HashMap<usize, LevelConstraint>,
    constraint_levels: HashMap<String, usize>,
    ltree: Option<LogicalTree>,
    instances: InstanceGroup,
}

impl PlacementGroup {
    /// Create a placement group of `size` instances with the given
    /// per-instance demand.
    pub fn new(id: impl Into<String>, size: usize, demand: Allocation) -> GroveResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GroveError::BadInput("empty group id".to_string()));
        }
        if demand.is_empty() {
            return Err(GroveError::BadInput(format!(
                "group {id} has no resource demand"
            )));
        }
        let instances = InstanceGroup::new(id.clone(), size, &demand)?;
        Ok(Self {
            id,
            size,
            demand,
            constraints: HashMap::new(),
            constraint_levels: HashMap::new(),
            ltree: None,
            instances,
        })
    }

    /// The unique id of this group.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Per-instance resource demand.
    pub fn demand(&self) -> &Allocation {
        &self.demand
    }

    /// The owned instances.
    pub fn instances(&self) -> &InstanceGroup {
        &self.instances
    }

    /// Install a constraint, evicting any prior constraint with the same
    /// id or at the same level.
    pub fn add_level_constraint(&mut self, lc: LevelConstraint) {
        self.remove_level_constraint(lc.id());
        self.remove_level_constraint_at(lc.level());
        self.constraint_levels.insert(lc.id().to_string(), lc.level());
        self.constraints.insert(lc.level(), lc);
    }

    /// Remove a constraint by id.
    pub fn remove_level_constraint(&mut self, id: &str) {
        if let Some(level) = self.constraint_levels.remove(id) {
            self.constraints.remove(&level);
        }
    }

    /// Remove a constraint by level.
    pub fn remove_level_constraint_at(&mut self, level: usize) {
        if let Some(lc) = self.constraints.remove(&level) {
            self.constraint_levels.remove(lc.id());
        }
    }

    /// The constraint at a level, or the default (soft Pack) anchored there.
    pub fn level_constraint(&self, level: usize) -> LevelConstraint {
        match self.constraints.get(&level) {
            Some(lc) => lc.clone(),
            None => LevelConstraint::default_at(level),
        }
    }

    /// Ids of the installed constraints.
    pub fn constraint_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constraint_levels.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The logical tree of the latest placement, if any.
    pub fn logical_tree(&self) -> Option<&LogicalTree> {
        self.ltree.as_ref()
    }

    /// Install (or clear) the logical tree.
    pub fn set_logical_tree(&mut self, ltree: Option<LogicalTree>) {
        self.ltree = ltree;
    }

    /// True iff the whole group is placed.
    pub fn is_fully_placed(&self) -> bool {
        match &self.ltree {
            Some(ltree) => ltree.root_count() == self.size as i64,
            None => false,
        }
    }

    /// Claim all members of the group.
    pub fn claim_all(&mut self, ptree: &mut PhysicalTree) -> bool {
        self.claim(self.size, ptree)
    }

    /// Claim `n` members: walk the logical leaves in traversal order and
    /// allocate the next unhosted instances onto the leaf hosts until `n`
    /// placements succeed, then percolate the claimed counts, copy them
    /// into the physical tree, and re-percolate resources.
    ///
    /// Instances already hosted on a leaf keep counting toward its claimed
    /// value, so `claim(0)` is a no-op and repeated claims are cumulative.
    /// `false` when the group has no logical tree or it has no leaves.
    pub fn claim(&mut self, n: usize, ptree: &mut PhysicalTree) -> bool {
        let Some(ltree) = &mut self.ltree else {
            return false;
        };
        let leaves = ltree.tree().leaves();
        if leaves.is_empty() {
            return false;
        }

        let mut succeeded = 0;
        for leaf in leaves {
            let (leaf_id, count) = {
                let node = ltree.tree().node(leaf);
                (node.id().to_string(), node.data.count)
            };
            let already = self.instances.num_hosted_on(&leaf_id).min(count);
            ltree.tree_mut().node_mut(leaf).data.claimed = already;

            let Some(host) = ptree.host(&leaf_id).cloned() else {
                continue;
            };
            let mut room = count - already;
            while room > 0 && succeeded < n {
                let Some(index) = self.instances.next_unhosted() else {
                    break;
                };
                if !host
                    .write()
                    .place_instance(&mut self.instances.members_mut()[index])
                {
                    break;
                }
                ltree.tree_mut().node_mut(leaf).data.claimed += 1;
                succeeded += 1;
                room -= 1;
            }
        }
        debug!(group = %self.id, requested = n, succeeded, "claimed instances");

        ltree.percolate_claimed();
        ltree.set_physical_claimed(ptree);
        ptree.percolate_resources();
        true
    }

    /// Unclaim all members: unplace every hosted instance, reset the
    /// claimed state of both trees, and re-percolate resources.
    /// `false` when the group has no logical tree.
    pub fn unclaim_all(&mut self, ptree: &mut PhysicalTree) -> bool {
        if self.ltree.is_none() {
            return false;
        }
        for instance in self.instances.members_mut() {
            let Some(host_id) = instance.host().map(String::from) else {
                continue;
            };
            if let Some(host) = ptree.host(&host_id).cloned() {
                host.write().unplace_instance(instance);
            }
        }
        if let Some(ltree) = &mut self.ltree {
            ltree.reset_claimed(true);
        }
        ptree.reset_num_claimed();
        ptree.percolate_resources();
        true
    }
}

impl fmt::Display for PlacementGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group {}: size={}; demand={}; constraints={:?}",
            self.id,
            self.size,
            self.demand,
            self.constraint_ids()
        )
    }
}
