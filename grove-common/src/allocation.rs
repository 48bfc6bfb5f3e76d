// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Multi-dimensional resource vectors.
//!
//! An [`Allocation`] is an ordered vector of integer resource quantities of
//! fixed length (resource names are kept out of the hot path). All binary
//! operations require same-length operands and report a mismatch through
//! their return value rather than panicking.

use std::fmt;

use crate::constants::FIT_SATURATION;

/// An allocation of an ordered array of resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    values: Vec<i64>,
}

impl Allocation {
    /// Create a zero allocation of the given length.
    pub fn zeros(size: usize) -> Self {
        Self {
            values: vec![0; size],
        }
    }

    /// Create an allocation from a slice of values.
    pub fn from_values(values: &[i64]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }

    /// Number of resource dimensions. Immutable after creation.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True iff the allocation has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw values.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Check if same length as another allocation.
    pub fn same_size(&self, other: &Allocation) -> bool {
        self.len() == other.len()
    }

    /// Add another allocation element-wise, in place.
    /// Returns `false` on unequal lengths.
    pub fn add(&mut self, other: &Allocation) -> bool {
        if !self.same_size(other) {
            return false;
        }
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += b;
        }
        true
    }

    /// Subtract another allocation element-wise, in place.
    /// Returns `false` on unequal lengths.
    pub fn subtract(&mut self, other: &Allocation) -> bool {
        if !self.same_size(other) {
            return false;
        }
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a -= b;
        }
        true
    }

    /// Divide this allocation element-wise by another.
    ///
    /// A zero divisor dimension saturates to [`FIT_SATURATION`].
    /// Returns `None` on unequal lengths.
    pub fn divide(&self, other: &Allocation) -> Option<Allocation> {
        if !self.same_size(other) {
            return None;
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| if *b == 0 { FIT_SATURATION } else { a / b })
            .collect();
        Some(Allocation { values })
    }

    /// Multiply all elements by a value, in place.
    pub fn scale(&mut self, value: i64) {
        for v in &mut self.values {
            *v *= value;
        }
    }

    /// Minimum element value (0 when empty).
    pub fn minimum(&self) -> i64 {
        self.values.iter().copied().min().unwrap_or(0)
    }

    /// Maximum element value (0 when empty).
    pub fn maximum(&self) -> i64 {
        self.values.iter().copied().max().unwrap_or(0)
    }

    /// Set all elements to zero.
    pub fn set_zero(&mut self) {
        for v in &mut self.values {
            *v = 0;
        }
    }

    /// True iff all elements are zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }

    /// Element-wise equality. `false` on unequal lengths.
    pub fn equal(&self, other: &Allocation) -> bool {
        self.same_size(other) && self.values == other.values
    }

    /// Element-wise `<=`. `false` on unequal lengths.
    pub fn less_or_equal(&self, other: &Allocation) -> bool {
        self.same_size(other)
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a <= b)
    }

    /// Check if this demand fits on an entity with the given capacity and
    /// already allocated values. `false` on unequal lengths.
    pub fn fit(&self, allocated: &Allocation, capacity: &Allocation) -> bool {
        let mut available = capacity.clone();
        if available.subtract(allocated) {
            return self.less_or_equal(&available);
        }
        false
    }

    /// Number of copies of this demand fitting on an entity with the given
    /// capacity and already allocated values (0 on unequal lengths).
    ///
    /// May be negative when the entity is overcommitted.
    pub fn number_to_fit(&self, allocated: &Allocation, capacity: &Allocation) -> i64 {
        let mut available = capacity.clone();
        if available.subtract(allocated) {
            if let Some(result) = available.divide(self) {
                return result.minimum();
            }
        }
        0
    }

    /// Render with resource names, e.g. `[cpu:4, mem:32]`.
    /// Empty string on unequal lengths.
    pub fn pretty(&self, resource_names: &[String]) -> String {
        if resource_names.len() != self.len() {
            return String::new();
        }
        let parts: Vec<String> = resource_names
            .iter()
            .zip(&self.values)
            .map(|(name, v)| format!("{name}:{v}"))
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.values)
    }
}
