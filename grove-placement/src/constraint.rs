// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Per-level structural constraints.

use std::fmt;

use grove_common::error::{GroveError, GroveResult};

/// How instances relate to the subtrees of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Distribute instances across subtrees.
    Spread,
    /// Concentrate instances in few subtrees.
    Pack,
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affinity::Spread => write!(f, "Spread"),
            Affinity::Pack => write!(f, "Pack"),
        }
    }
}

/// A constraint on how a group divides into partitions at one tree level.
///
/// Hard constraints fix the partition size: Pack places everything in one
/// subtree, Spread places at most one instance per subtree; the optional
/// knobs are ignored. Soft constraints steer the partition size toward the
/// packed or spread extreme and may additionally fix the number of
/// partitions, restrict the partition size to a `[min, max]` range, or
/// require partition sizes to be multiples of a factor. Some combinations
/// are infeasible and are only detected during placement.
#[derive(Debug, Clone)]
pub struct LevelConstraint {
    id: String,
    level: usize,
    affinity: Affinity,
    hard: bool,
    // optional knobs, meaningful only when soft; 0 means unset
    min_range: i64,
    max_range: i64,
    num_partitions: i64,
    factor: i64,
}

impl LevelConstraint {
    /// Create a constraint at a level.
    pub fn new(
        id: impl Into<String>,
        level: usize,
        affinity: Affinity,
        hard: bool,
    ) -> GroveResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GroveError::BadInput("empty constraint id".to_string()));
        }
        Ok(Self {
            id,
            level,
            affinity,
            hard,
            min_range: 0,
            max_range: 0,
            num_partitions: 0,
            factor: 1,
        })
    }

    /// The constraint used when a level has none installed:
    /// soft Pack with no extras.
    pub fn default_at(level: usize) -> Self {
        Self {
            id: "lc-default".to_string(),
            level,
            affinity: Affinity::Pack,
            hard: false,
            min_range: 0,
            max_range: 0,
            num_partitions: 0,
            factor: 1,
        }
    }

    /// The unique id of this constraint.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The level this constraint applies to.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The affinity of this constraint.
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Whether the constraint is hard.
    pub fn is_hard(&self) -> bool {
        self.hard
    }

    /// Restrict the partition size to `[min, max]`.
    /// `false` if the constraint is hard or the range is invalid.
    pub fn set_range(&mut self, min: i64, max: i64) -> bool {
        if self.hard || min <= 0 || max < min {
            return false;
        }
        self.min_range = min;
        self.max_range = max;
        true
    }

    /// The `[min, max]` partition size range, if set.
    pub fn range(&self) -> Option<(i64, i64)> {
        if !self.hard && self.min_range > 0 && self.max_range >= self.min_range {
            Some((self.min_range, self.max_range))
        } else {
            None
        }
    }

    /// Fix the number of partitions at this level.
    /// `false` if the constraint is hard or `num <= 0`.
    pub fn set_num_partitions(&mut self, num: i64) -> bool {
        if self.hard || num <= 0 {
            return false;
        }
        self.num_partitions = num;
        true
    }

    /// The fixed number of partitions, if set.
    pub fn num_partitions(&self) -> Option<i64> {
        if !self.hard && self.num_partitions > 0 {
            Some(self.num_partitions)
        } else {
            None
        }
    }

    /// Require partition sizes to be multiples of `factor`.
    /// `false` if `factor < 1`.
    pub fn set_factor(&mut self, factor: i64) -> bool {
        if factor < 1 {
            return false;
        }
        self.factor = factor;
        true
    }

    /// The divisibility factor (1 when unset).
    pub fn factor(&self) -> i64 {
        self.factor
    }

    /// The divisibility factor when greater than 1.
    pub fn factor_if_set(&self) -> Option<i64> {
        if self.factor > 1 {
            Some(self.factor)
        } else {
            None
        }
    }
}

impl fmt::Display for LevelConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "constraint {}: level={}; affinity={}; hard={}",
            self.id, self.level, self.affinity, self.hard
        )?;
        if let Some((min, max)) = self.range() {
            write!(f, "; range=[{min},{max}]")?;
        }
        if let Some(num) = self.num_partitions() {
            write!(f, "; partitions={num}")?;
        }
        if let Some(factor) = self.factor_if_set() {
            write!(f, "; factor={factor}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_id() {
        assert!(LevelConstraint::new("", 0, Affinity::Pack, false).is_err());
    }

    #[test]
    fn test_range_validation() {
        let mut lc = LevelConstraint::new("lc", 1, Affinity::Spread, false).unwrap();
        assert!(!lc.set_range(0, 4));
        assert!(!lc.set_range(4, 2));
        assert!(lc.set_range(2, 4));
        assert_eq!(lc.range(), Some((2, 4)));

        let mut hard = LevelConstraint::new("lc-h", 1, Affinity::Spread, true).unwrap();
        assert!(!hard.set_range(2, 4));
        assert_eq!(hard.range(), None);
    }

    #[test]
    fn test_num_partitions_validation() {
        let mut lc = LevelConstraint::new("lc", 1, Affinity::Spread, false).unwrap();
        assert!(!lc.set_num_partitions(0));
        assert!(lc.set_num_partitions(3));
        assert_eq!(lc.num_partitions(), Some(3));

        let mut hard = LevelConstraint::new("lc-h", 1, Affinity::Spread, true).unwrap();
        assert!(!hard.set_num_partitions(3));
        assert_eq!(hard.num_partitions(), None);
    }

    #[test]
    fn test_factor() {
        let mut lc = LevelConstraint::new("lc", 0, Affinity::Pack, false).unwrap();
        assert_eq!(lc.factor(), 1);
        assert_eq!(lc.factor_if_set(), None);
        assert!(!lc.set_factor(0));
        assert!(lc.set_factor(2));
        assert_eq!(lc.factor_if_set(), Some(2));
    }

    #[test]
    fn test_default_is_soft_pack() {
        let lc = LevelConstraint::default_at(3);
        assert_eq!(lc.level(), 3);
        assert_eq!(lc.affinity(), Affinity::Pack);
        assert!(!lc.is_hard());
        assert_eq!(lc.factor(), 1);
        assert_eq!(lc.range(), None);
        assert_eq!(lc.num_partitions(), None);
    }
}
