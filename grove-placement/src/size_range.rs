// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Per-node feasible intervals of instances to place.
//!
//! A [`SizeRange`] translates the level constraint at a node into the
//! `{min, desired, max, factor}` interval of instances that may be placed
//! in the node's subtree, given how many are available and how many sibling
//! subtrees and committed partitions surround it.

use std::fmt;

use grove_common::arith::{above_multiple, below_multiple, ceil_divide};

use crate::constraint::Affinity;
use crate::group::PlacementGroup;

/// Desired range of the number of instances to place at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeRange {
    /// Minimum acceptable count.
    pub min: i64,
    /// Preferred count.
    pub desired: i64,
    /// Maximum acceptable count.
    pub max: i64,
    /// Counts must be multiples of this factor.
    pub factor: i64,
}

impl SizeRange {
    /// Derive the size range at a node.
    ///
    /// - `level`: the level of the node
    /// - `num_to_place`: instances available to the node and its siblings
    /// - `num_nodes`: sibling subtrees still usable, including this one
    /// - `num_partitions_placed`: partitions committed at this level so far
    ///
    /// `None` when the parameters are degenerate or no placement satisfying
    /// the constraint is possible.
    pub fn for_level(
        pg: &PlacementGroup,
        level: usize,
        num_to_place: i64,
        num_nodes: i64,
        num_partitions_placed: i64,
    ) -> Option<SizeRange> {
        if num_to_place <= 0 || num_nodes <= 0 || num_partitions_placed < 0 {
            return None;
        }

        let lc = pg.level_constraint(level);
        let affinity = lc.affinity();
        let mut factor = 1;

        let (min, desired, max);
        if lc.is_hard() {
            let fixed = if affinity == Affinity::Pack { num_to_place } else { 1 };
            min = fixed;
            desired = fixed;
            max = fixed;
        } else {
            // remaining partitions, when a partition count is set
            let mut num_partitions_left = -1;
            if let Some(num_partitions) = lc.num_partitions() {
                num_partitions_left = num_partitions - num_partitions_placed;
                if num_partitions_left <= 0 || num_partitions_left > num_nodes {
                    return None;
                }
            }

            let range = lc.range();
            let min_to_place = range.map(|(lo, _)| lo).unwrap_or(1);
            let mut min_to_leave = 0;
            if num_partitions_left > 1 {
                min_to_leave = num_partitions_left - 1;
                if let Some((lo, _)) = range {
                    min_to_leave *= lo;
                }
            }
            if num_to_place < min_to_place + min_to_leave {
                return None;
            }

            let (mut lo, mut want, mut hi);
            if affinity == Affinity::Pack {
                want = num_to_place - min_to_leave;
                match range {
                    Some((min_range, max_range)) => {
                        want = want.min(max_range);
                        lo = min_range;
                        hi = max_range;
                    }
                    None => {
                        lo = 1;
                        hi = want;
                    }
                }
            } else {
                let divisor = if num_partitions_left > 0 {
                    num_partitions_left
                } else {
                    num_nodes
                };
                want = ceil_divide(num_to_place, divisor).max(1);
                match range {
                    Some((min_range, max_range)) => {
                        want = want.max(min_range).min(max_range);
                        lo = min_range;
                        hi = max_range;
                    }
                    None => {
                        lo = 1;
                        hi = num_to_place;
                    }
                }
            }

            if let Some(f) = lc.factor_if_set() {
                factor = f;
                lo = above_multiple(lo, f)?;
                hi = below_multiple(hi, f)?;
                want = below_multiple(want, f)?;
                if lo > want || want > hi {
                    return None;
                }
            }
            min = lo;
            desired = want;
            max = hi;
        }

        Some(SizeRange {
            min,
            desired,
            max,
            factor,
        })
    }

    /// Best number of instances to place given the number that fits.
    pub fn number_to_place(&self, num_fit: i64) -> i64 {
        if num_fit < self.min {
            return 0;
        }
        let mut num_fit = num_fit;
        if self.factor > 1 {
            match below_multiple(num_fit, self.factor) {
                Some(v) => num_fit = v,
                None => return 0,
            }
        }
        num_fit.min(self.max).min(self.desired)
    }

    /// Check whether a count falls within the range.
    pub fn number_in_range(&self, num: i64) -> bool {
        num >= self.min && num <= self.max && num % self.factor == 0
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.min, self.desired, self.max)
    }
}
