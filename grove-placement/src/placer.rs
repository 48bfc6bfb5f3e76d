// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The recursive placement algorithm.
//!
//! A [`Placer`] binds to a physical tree and places a group by descending
//! from the root: at every node the level constraint is resolved into a
//! [`SizeRange`], the children are sorted by the selection policy, and the
//! available instances are divided among them. A subtree whose final count
//! violates its size range rolls back to zero and the parent continues
//! with the next sibling.
//!
//! Partial placement repairs a previously claimed placement after the
//! physical state drifted: claimed subtrees are never pushed below their
//! existing claim, and claimed slots remain placement candidates.
//!
//! The placer owns the transient `num_fit` / `num_claimed` fields of its
//! tree for the duration of one call and is not re-entrant.

use std::cmp::Ordering;

use tracing::warn;

use grove_common::error::{GroveError, GroveResult};
use grove_topology::logical::{LogicalData, LogicalTree};
use grove_topology::physical::{PhysData, PhysicalTree};
use grove_topology::tree::{NodeId, Tree};

use crate::constraint::Affinity;
use crate::group::PlacementGroup;
use crate::size_range::SizeRange;

/// Child selection policy: the sort key used when dividing instances
/// among the subtrees of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Order by fit count.
    Default,
    /// Order by fit count, break ties by weight.
    ByWeight,
    /// Order by fit count then weight; partial placement orders by the
    /// product of weight and claimed count.
    ByWeightProduct,
    /// Order by the product of weight and fit count.
    ByFitWeightProduct,
    /// Order by the product of weight and minimum available resource.
    ByMinWeightedAvailability,
}

/// Placer of a placement group onto a physical tree.
pub struct Placer<'t> {
    ptree: &'t mut PhysicalTree,
    num_remaining: i64,
    num_claimed_remaining: i64,
}

/// One node of a placement under construction. Children are attached only
/// when they placed something, and dropping them undoes a subtree.
struct Placement {
    id: String,
    count: i64,
    claimed: i64,
    children: Vec<Placement>,
}

impl Placement {
    fn new(id: String) -> Self {
        Self {
            id,
            count: 0,
            claimed: 0,
            children: Vec::new(),
        }
    }
}

impl<'t> Placer<'t> {
    /// Create a placer bound to a physical tree.
    pub fn new(ptree: &'t mut PhysicalTree) -> Self {
        Self {
            ptree,
            num_remaining: 0,
            num_claimed_remaining: 0,
        }
    }

    /// Place a group with the default policy.
    pub fn place_group(&mut self, pg: &mut PlacementGroup) -> GroveResult<()> {
        self.place_group_with(pg, Policy::Default)
    }

    /// Place a group ranking children by fit count, then weight.
    pub fn place_group_by_weight(&mut self, pg: &mut PlacementGroup) -> GroveResult<()> {
        self.place_group_with(pg, Policy::ByWeight)
    }

    /// Place a group with the weight-product policy.
    pub fn place_group_by_weight_product(&mut self, pg: &mut PlacementGroup) -> GroveResult<()> {
        self.place_group_with(pg, Policy::ByWeightProduct)
    }

    /// Place a group ranking children by weight x fit count.
    pub fn place_group_by_fit_weight_product(
        &mut self,
        pg: &mut PlacementGroup,
    ) -> GroveResult<()> {
        self.place_group_with(pg, Policy::ByFitWeightProduct)
    }

    /// Place a group ranking children by weight x minimum availability.
    pub fn place_group_by_min_weighted_availability(
        &mut self,
        pg: &mut PlacementGroup,
    ) -> GroveResult<()> {
        self.place_group_with(pg, Policy::ByMinWeightedAvailability)
    }

    /// Place a group with an explicit policy. On success the resulting
    /// logical tree is installed on the group.
    pub fn place_group_with(
        &mut self,
        pg: &mut PlacementGroup,
        policy: Policy,
    ) -> GroveResult<()> {
        let result = self.place_full(pg, policy);
        self.cleanup();
        result
    }

    /// Re-place a partially claimed group with the default policy.
    pub fn place_partial_group(&mut self, pg: &mut PlacementGroup) -> GroveResult<()> {
        self.place_partial_group_with(pg, Policy::Default)
    }

    /// Re-place a partially claimed group, ranking by claimed then weight.
    pub fn place_partial_group_by_weight(&mut self, pg: &mut PlacementGroup) -> GroveResult<()> {
        self.place_partial_group_with(pg, Policy::ByWeight)
    }

    /// Re-place a partially claimed group with the weight-product policy.
    pub fn place_partial_group_by_weight_product(
        &mut self,
        pg: &mut PlacementGroup,
    ) -> GroveResult<()> {
        self.place_partial_group_with(pg, Policy::ByWeightProduct)
    }

    /// Re-place a partially claimed group with the fit-weight-product policy.
    pub fn place_partial_group_by_fit_weight_product(
        &mut self,
        pg: &mut PlacementGroup,
    ) -> GroveResult<()> {
        self.place_partial_group_with(pg, Policy::ByFitWeightProduct)
    }

    /// Re-place a partially claimed group with the min-weighted-availability
    /// policy.
    pub fn place_partial_group_by_min_weighted_availability(
        &mut self,
        pg: &mut PlacementGroup,
    ) -> GroveResult<()> {
        self.place_partial_group_with(pg, Policy::ByMinWeightedAvailability)
    }

    /// Re-place a partially claimed group with an explicit policy.
    ///
    /// Claimed leaves keep at least their claimed count; whatever the
    /// recursion places is committed without size-range rollback.
    pub fn place_partial_group_with(
        &mut self,
        pg: &mut PlacementGroup,
        policy: Policy,
    ) -> GroveResult<()> {
        let result = self.place_partial(pg, policy);
        self.cleanup();
        result
    }

    /// Bind the group and percolate its fit counts.
    fn place_init(&mut self, pg: &PlacementGroup) -> GroveResult<NodeId> {
        let root = self.ptree.tree().root().ok_or(GroveError::EmptyTree)?;
        self.num_remaining = pg.size() as i64;
        if self.num_remaining == 0 {
            return Err(GroveError::EmptyGroup);
        }
        self.ptree.percolate_num_fit(pg.demand());
        Ok(root)
    }

    /// Reset the transient fit counts. Runs on every exit path.
    fn cleanup(&mut self) {
        self.ptree.reset_num_fit();
    }

    fn place_full(&mut self, pg: &mut PlacementGroup, policy: Policy) -> GroveResult<()> {
        let root = self.place_init(pg)?;
        let placement = self.place_at(pg, root, 1, self.num_remaining, 0, policy);
        if placement.count == 0 {
            return Err(GroveError::PlacementFailed);
        }
        pg.set_logical_tree(Some(build_logical_tree(placement)));
        Ok(())
    }

    fn place_partial(&mut self, pg: &mut PlacementGroup, policy: Policy) -> GroveResult<()> {
        let root = self.place_init(pg)?;
        {
            let prior = pg.logical_tree().ok_or(GroveError::NoPartialState)?;
            self.ptree.reset_num_claimed();
            prior.set_physical_claimed(self.ptree);
        }
        let root_claimed = self.ptree.tree().node(root).data.num_claimed;
        self.num_remaining -= root_claimed;
        if self.num_remaining == 0 {
            // everything is claimed already; keep the existing tree
            return Ok(());
        }
        if self.num_remaining < 0 {
            return Err(GroveError::Overcommitted {
                claimed: root_claimed,
                size: pg.size() as i64,
            });
        }
        self.ptree.merge_claimed_to_fit();

        self.num_claimed_remaining = root_claimed;
        let placement = self.place_partial_at(pg, root, 1, self.num_remaining, 0, policy);
        if self.num_claimed_remaining > 0 {
            warn!(
                group = %pg.id(),
                remaining = self.num_claimed_remaining,
                "not all claimed instances were re-placed"
            );
        }
        if placement.count == 0 {
            return Err(GroveError::PlacementFailed);
        }
        let mut ltree = build_logical_tree(placement);
        ltree.percolate_claimed();
        pg.set_logical_tree(Some(ltree));
        Ok(())
    }

    /// Place part of the group on the subtree rooted at `node`.
    ///
    /// - `num_nodes`: sibling subtrees targeted for placement, including
    ///   this one
    /// - `num_to_place`: instances available at this node
    /// - `num_partitions_placed`: partitions committed at this level so far
    fn place_at(
        &mut self,
        pg: &PlacementGroup,
        node: NodeId,
        num_nodes: i64,
        num_to_place: i64,
        num_partitions_placed: i64,
        policy: Policy,
    ) -> Placement {
        let (id, level, num_fit) = {
            let n = self.ptree.tree().node(node);
            (n.id().to_string(), n.data.level, n.data.num_fit)
        };
        let mut placement = Placement::new(id);

        let Some(sr) =
            SizeRange::for_level(pg, level, num_to_place, num_nodes, num_partitions_placed)
        else {
            return placement;
        };
        let mut num_desired = sr.number_to_place(num_fit);
        if num_desired == 0 {
            return placement;
        }

        let mut num_placed = 0;
        if level == 0 {
            num_placed = num_desired;
            self.num_remaining -= num_placed;
        } else {
            let child_level = level - 1;
            let lc = pg.level_constraint(child_level);
            let num_partitions = lc.num_partitions().unwrap_or(0);
            let min_range = lc.range().map(|(lo, _)| lo).unwrap_or(1);
            let num_children = self.ptree.tree().node(node).children().len() as i64;

            if num_partitions <= num_children && num_desired >= num_partitions * min_range {
                self.sort_children(pg, node, child_level, policy, false);
                let children = self.ptree.tree().node(node).children().to_vec();

                let mut usable_nodes = num_children;
                let mut start = 0;
                if num_partitions > 0 {
                    usable_nodes = num_partitions;
                    if pg.level_constraint(level).affinity() == Affinity::Spread {
                        start = (num_children - num_partitions) as usize;
                    }
                }
                let mut partitions_used = 0;
                for &child in &children[start..] {
                    if num_desired <= 0 {
                        break;
                    }
                    let sub =
                        self.place_at(pg, child, usable_nodes, num_desired, partitions_used, policy);
                    usable_nodes -= 1;
                    if sub.count > 0 {
                        num_placed += sub.count;
                        num_desired -= sub.count;
                        partitions_used += 1;
                        placement.children.push(sub);
                    }
                }
            }
        }

        if num_placed == 0 || sr.number_in_range(num_placed) {
            placement.count = num_placed;
        } else {
            warn!(
                node = %placement.id,
                can_place = num_placed,
                size_range = %sr,
                "failed placement at node: count outside size range"
            );
            placement.children.clear();
            self.num_remaining += num_placed;
            placement.count = 0;
        }
        placement
    }

    /// Partial-placement variant of [`Self::place_at`].
    ///
    /// `num_to_place` counts unclaimed instances only; the node's claimed
    /// count is added on top, and the result is committed without rollback.
    fn place_partial_at(
        &mut self,
        pg: &PlacementGroup,
        node: NodeId,
        num_nodes: i64,
        num_to_place: i64,
        num_partitions_placed: i64,
        policy: Policy,
    ) -> Placement {
        let (id, level, num_fit, node_claimed) = {
            let n = self.ptree.tree().node(node);
            (n.id().to_string(), n.data.level, n.data.num_fit, n.data.num_claimed)
        };
        let mut placement = Placement::new(id);

        let total_to_place = num_to_place + node_claimed;
        let Some(sr) =
            SizeRange::for_level(pg, level, total_to_place, num_nodes, num_partitions_placed)
        else {
            return placement;
        };
        // never push a claimed subtree below its existing claim
        let mut num_desired = sr.number_to_place(num_fit).max(node_claimed);

        let mut num_placed = 0;
        if level == 0 {
            num_placed = num_desired;
            let claimed_here = num_placed.min(node_claimed);
            self.num_remaining -= num_placed - claimed_here;
            self.num_claimed_remaining -= claimed_here;
            placement.claimed = claimed_here;
        } else {
            let child_level = level - 1;
            let lc = pg.level_constraint(child_level);
            let num_partitions = lc.num_partitions().unwrap_or(0);
            let min_range = lc.range().map(|(lo, _)| lo).unwrap_or(1);
            let num_children = self.ptree.tree().node(node).children().len() as i64;

            if num_partitions <= num_children && total_to_place >= num_partitions * min_range {
                self.sort_children(pg, node, child_level, policy, true);
                let children = self.ptree.tree().node(node).children().to_vec();

                let mut claimed_remaining = node_claimed;
                let mut usable_nodes = num_children;
                let mut start = 0;
                if num_partitions > 0 {
                    usable_nodes = num_partitions;
                    if pg.level_constraint(level).affinity() == Affinity::Spread {
                        start = (num_children - num_partitions) as usize;
                    }
                }
                let mut partitions_used = 0;
                for &child in &children[start..] {
                    if num_desired <= 0 {
                        break;
                    }
                    let child_claimed = self.ptree.tree().node(child).data.num_claimed;
                    let num_unclaimed = (num_desired - claimed_remaining).max(0);
                    let sub = self.place_partial_at(
                        pg,
                        child,
                        usable_nodes,
                        num_unclaimed,
                        partitions_used,
                        policy,
                    );
                    usable_nodes -= 1;
                    if sub.count > 0 {
                        num_placed += sub.count;
                        num_desired -= sub.count;
                        claimed_remaining -= sub.count.min(child_claimed);
                        partitions_used += 1;
                        placement.children.push(sub);
                    }
                }
            }
        }
        placement.count = num_placed;
        placement
    }

    /// Sort the children of a node in place according to the policy.
    ///
    /// Direction is ascending iff the affinity at the children's level is
    /// Spread, keeping the best candidate first under both affinities.
    fn sort_children(
        &mut self,
        pg: &PlacementGroup,
        node: NodeId,
        child_level: usize,
        policy: Policy,
        partial: bool,
    ) {
        let increasing = pg.level_constraint(child_level).affinity() == Affinity::Spread;
        self.ptree
            .tree_mut()
            .sort_children_by(node, |a, b| compare(&a.data, &b.data, policy, increasing, partial));
    }
}

/// Order two primary keys: ascending when `increasing`, else descending.
fn keyed(a: i64, b: i64, increasing: bool) -> Ordering {
    if increasing {
        a.cmp(&b)
    } else {
        b.cmp(&a)
    }
}

/// Policy comparator between two physical nodes.
///
/// Partial-placement keys that rank claimed counts always put larger
/// claims first, independent of direction.
fn compare(a: &PhysData, b: &PhysData, policy: Policy, increasing: bool, partial: bool) -> Ordering {
    if partial {
        match policy {
            Policy::Default => keyed(a.num_claimed, b.num_claimed, false)
                .then_with(|| keyed(a.num_fit, b.num_fit, increasing)),
            Policy::ByWeight => keyed(a.num_claimed, b.num_claimed, false)
                .then_with(|| keyed(a.weight(), b.weight(), increasing)),
            Policy::ByWeightProduct => keyed(
                a.weight() * a.num_claimed,
                b.weight() * b.num_claimed,
                false,
            )
            .then_with(|| keyed(a.weight(), b.weight(), increasing)),
            Policy::ByFitWeightProduct => {
                keyed(a.weight() * a.num_fit, b.weight() * b.num_fit, increasing)
                    .then_with(|| keyed(a.num_fit, b.num_fit, increasing))
            }
            Policy::ByMinWeightedAvailability => keyed(
                a.weight() * a.available().minimum(),
                b.weight() * b.available().minimum(),
                increasing,
            )
            .then_with(|| keyed(a.weight(), b.weight(), increasing)),
        }
    } else {
        match policy {
            Policy::Default => keyed(a.num_fit, b.num_fit, increasing),
            // the weight-product key applies to partial placement only
            Policy::ByWeight | Policy::ByWeightProduct => {
                keyed(a.num_fit, b.num_fit, increasing)
                    .then_with(|| keyed(a.weight(), b.weight(), increasing))
            }
            Policy::ByFitWeightProduct => {
                keyed(a.weight() * a.num_fit, b.weight() * b.num_fit, increasing)
                    .then_with(|| keyed(a.num_fit, b.num_fit, increasing))
            }
            Policy::ByMinWeightedAvailability => keyed(
                a.weight() * a.available().minimum(),
                b.weight() * b.available().minimum(),
                increasing,
            )
            .then_with(|| keyed(a.weight(), b.weight(), increasing)),
        }
    }
}

/// Flatten a placement into a logical tree, preserving child order.
fn build_logical_tree(root: Placement) -> LogicalTree {
    let mut tree = Tree::new();
    let data = LogicalData {
        count: root.count,
        claimed: root.claimed,
    };
    if let Some(root_id) = tree.insert_root(root.id, data) {
        let mut work = vec![(root_id, root.children)];
        while let Some((parent, children)) = work.pop() {
            for child in children {
                let data = LogicalData {
                    count: child.count,
                    claimed: child.claimed,
                };
                if let Some(child_id) = tree.add_child(parent, child.id, data) {
                    work.push((child_id, child.children));
                }
            }
        }
    }
    LogicalTree::new(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_common::allocation::Allocation;
    use grove_topology::host::Host;

    fn make_data(num_fit: i64, num_claimed: i64, weight: i64) -> PhysData {
        let mut data = PhysData::new(0, 1);
        data.num_fit = num_fit;
        data.num_claimed = num_claimed;
        data.set_weight(weight);
        data
    }

    #[test]
    fn test_compare_default_direction() {
        let a = make_data(2, 0, 1);
        let b = make_data(5, 0, 1);

        // spread: ascending, fewer fits first
        assert_eq!(compare(&a, &b, Policy::Default, true, false), Ordering::Less);
        // pack: descending, more fits first
        assert_eq!(compare(&a, &b, Policy::Default, false, false), Ordering::Greater);
    }

    #[test]
    fn test_compare_by_weight_breaks_ties() {
        let a = make_data(3, 0, 1);
        let b = make_data(3, 0, 9);

        assert_eq!(compare(&a, &b, Policy::Default, false, false), Ordering::Equal);
        // pack: heavier node first on a fit tie
        assert_eq!(compare(&a, &b, Policy::ByWeight, false, false), Ordering::Greater);
        assert_eq!(compare(&a, &b, Policy::ByWeight, true, false), Ordering::Less);
    }

    #[test]
    fn test_compare_fit_weight_product() {
        let a = make_data(4, 0, 2); // product 8
        let b = make_data(2, 0, 5); // product 10

        assert_eq!(
            compare(&a, &b, Policy::ByFitWeightProduct, false, false),
            Ordering::Greater
        );
    }

    #[test]
    fn test_compare_partial_puts_claimed_first() {
        let a = make_data(9, 0, 1);
        let b = make_data(1, 3, 1);

        // regardless of direction, the claimed node sorts first
        for increasing in [false, true] {
            assert_eq!(
                compare(&b, &a, Policy::Default, increasing, true),
                Ordering::Less
            );
        }
    }

    #[test]
    fn test_empty_tree_and_empty_group_errors() {
        let mut ptree = PhysicalTree::new(Tree::new());
        let mut placer = Placer::new(&mut ptree);
        let mut pg = PlacementGroup::new("pg", 2, Allocation::from_values(&[1])).unwrap();
        assert_eq!(placer.place_group(&mut pg), Err(GroveError::EmptyTree));

        let mut tree = Tree::new();
        let root = tree.insert_root("root", PhysData::new(1, 1)).unwrap();
        tree.add_child(root, "h0", PhysData::new(0, 1)).unwrap();
        let mut ptree = PhysicalTree::new(tree);
        ptree
            .attach_host(Host::new("h0", &Allocation::from_values(&[4])).unwrap());

        let mut placer = Placer::new(&mut ptree);
        let mut empty = PlacementGroup::new("pg", 0, Allocation::from_values(&[1])).unwrap();
        assert_eq!(placer.place_group(&mut empty), Err(GroveError::EmptyGroup));
    }

    #[test]
    fn test_partial_requires_prior_tree() {
        let mut tree = Tree::new();
        let root = tree.insert_root("root", PhysData::new(1, 1)).unwrap();
        tree.add_child(root, "h0", PhysData::new(0, 1)).unwrap();
        let mut ptree = PhysicalTree::new(tree);
        ptree
            .attach_host(Host::new("h0", &Allocation::from_values(&[4])).unwrap());

        let mut placer = Placer::new(&mut ptree);
        let mut pg = PlacementGroup::new("pg", 2, Allocation::from_values(&[1])).unwrap();
        assert_eq!(
            placer.place_partial_group(&mut pg),
            Err(GroveError::NoPartialState)
        );
    }

    #[test]
    fn test_build_logical_tree_preserves_shape() {
        let mut root = Placement::new("root".to_string());
        root.count = 3;
        let mut rack = Placement::new("rack-0".to_string());
        rack.count = 3;
        let mut leaf = Placement::new("server-0".to_string());
        leaf.count = 3;
        leaf.claimed = 1;
        rack.children.push(leaf);
        root.children.push(rack);

        let ltree = build_logical_tree(root);
        assert_eq!(ltree.root_count(), 3);
        let s0 = ltree.tree().find("server-0").unwrap();
        assert_eq!(ltree.tree().node(s0).data.claimed, 1);
        assert_eq!(ltree.tree().leaf_ids(), vec!["server-0"]);
    }
}
