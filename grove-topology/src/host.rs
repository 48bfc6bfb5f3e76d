// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Hosts: leaf resource providers of the physical topology.

use std::collections::BTreeSet;
use std::fmt;

use grove_common::allocation::Allocation;
use grove_common::constants::DEFAULT_WEIGHT;
use grove_common::error::{GroveError, GroveResult};

use crate::instance::Instance;

/// A host (server): resource capacity, current allocation, a weight for
/// guiding placement decisions, and the set of instances it hosts.
///
/// Placing an instance never rejects on insufficient capacity; the
/// allocation is allowed to overflow and fit accounting absorbs it.
#[derive(Debug, Clone)]
pub struct Host {
    id: String,
    capacity: Allocation,
    allocated: Allocation,
    weight: i64,
    hosted: BTreeSet<String>,
}

impl Host {
    /// Create a host with the given capacity and zero allocation.
    pub fn new(id: impl Into<String>, capacity: &Allocation) -> GroveResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GroveError::BadInput("empty host id".to_string()));
        }
        if capacity.is_empty() {
            return Err(GroveError::BadInput(format!(
                "host {id} has no resource dimensions"
            )));
        }
        Ok(Self {
            id,
            allocated: Allocation::zeros(capacity.len()),
            capacity: capacity.clone(),
            weight: DEFAULT_WEIGHT,
            hosted: BTreeSet::new(),
        })
    }

    /// The unique id of this host.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource capacity.
    pub fn capacity(&self) -> &Allocation {
        &self.capacity
    }

    /// Resources currently allocated.
    pub fn allocated(&self) -> &Allocation {
        &self.allocated
    }

    /// Overwrite the allocated resources. `false` on length mismatch.
    pub fn set_allocated(&mut self, allocated: Allocation) -> bool {
        if !self.capacity.same_size(&allocated) {
            return false;
        }
        self.allocated = allocated;
        true
    }

    /// Add to the allocated resources. `false` on length mismatch.
    pub fn add_allocated(&mut self, delta: &Allocation) -> bool {
        self.allocated.add(delta)
    }

    /// Resources still available (may be negative when overcommitted).
    pub fn available(&self) -> Allocation {
        let mut available = self.capacity.clone();
        available.subtract(&self.allocated);
        available
    }

    /// The placement weight of this host.
    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// Set the placement weight of this host.
    pub fn set_weight(&mut self, weight: i64) {
        self.weight = weight;
    }

    /// Place an instance on this host: adds its demand to the allocation,
    /// registers it, and sets the instance's host back-reference.
    ///
    /// `false` if the demand length mismatches or the instance is already
    /// hosted here.
    pub fn place_instance(&mut self, instance: &mut Instance) -> bool {
        if !instance.demand().same_size(&self.capacity) {
            return false;
        }
        if self.hosted.contains(instance.id()) {
            return false;
        }
        self.allocated.add(instance.demand());
        self.hosted.insert(instance.id().to_string());
        instance.set_host(Some(self.id.clone()));
        true
    }

    /// Remove an instance from this host, releasing its demand and
    /// clearing the back-reference. `false` if it is not hosted here.
    pub fn unplace_instance(&mut self, instance: &mut Instance) -> bool {
        if !instance.demand().same_size(&self.capacity) {
            return false;
        }
        if !self.hosted.remove(instance.id()) {
            return false;
        }
        self.allocated.subtract(instance.demand());
        instance.set_host(None);
        true
    }

    /// Ids of all hosted instances, sorted.
    pub fn hosted_ids(&self) -> Vec<String> {
        self.hosted.iter().cloned().collect()
    }

    /// Number of hosted instances.
    pub fn num_hosted(&self) -> usize {
        self.hosted.len()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host {}: weight={}; cap={}; alloc={}; hosted={:?}",
            self.id,
            self.weight,
            self.capacity,
            self.allocated,
            self.hosted_ids()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_host() -> Host {
        Host::new("server-0", &Allocation::from_values(&[16, 256])).unwrap()
    }

    fn make_instance(id: &str) -> Instance {
        Instance::new(id, &Allocation::from_values(&[4, 32])).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(Host::new("", &Allocation::from_values(&[1])).is_err());
        assert!(Host::new("h", &Allocation::zeros(0)).is_err());
    }

    #[test]
    fn test_place_and_unplace() {
        let mut host = make_host();
        let mut vm = make_instance("vm0");

        assert!(host.place_instance(&mut vm));
        assert_eq!(host.allocated().values(), &[4, 32]);
        assert_eq!(vm.host(), Some("server-0"));
        assert_eq!(host.hosted_ids(), vec!["vm0"]);

        // double placement of the same instance is rejected
        assert!(!host.place_instance(&mut vm));

        assert!(host.unplace_instance(&mut vm));
        assert!(host.allocated().is_zero());
        assert_eq!(vm.host(), None);
        assert!(!host.unplace_instance(&mut vm));
    }

    #[test]
    fn test_overcommit_allowed() {
        let mut host = Host::new("h", &Allocation::from_values(&[4])).unwrap();
        let mut a = Instance::new("a", &Allocation::from_values(&[3])).unwrap();
        let mut b = Instance::new("b", &Allocation::from_values(&[3])).unwrap();

        assert!(host.place_instance(&mut a));
        assert!(host.place_instance(&mut b));
        assert_eq!(host.allocated().values(), &[6]);
        assert_eq!(host.available().values(), &[-2]);
    }

    #[test]
    fn test_demand_size_mismatch_rejected() {
        let mut host = make_host();
        let mut vm = Instance::new("vm0", &Allocation::from_values(&[4])).unwrap();
        assert!(!host.place_instance(&mut vm));
        assert!(host.allocated().is_zero());
    }

    #[test]
    fn test_hosted_ids_sorted() {
        let mut host = make_host();
        for id in ["vm2", "vm0", "vm1"] {
            let mut vm = make_instance(id);
            assert!(host.place_instance(&mut vm));
        }
        assert_eq!(host.hosted_ids(), vec!["vm0", "vm1", "vm2"]);
    }
}
