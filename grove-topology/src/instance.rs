// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Workload instances and homogeneous instance groups.

use std::fmt;

use grove_common::allocation::Allocation;
use grove_common::error::{GroveError, GroveResult};

/// A workload instance: a fixed resource demand and, when hosted, the id
/// of its host. Instances reference hosts by id, never by pointer.
#[derive(Debug, Clone)]
pub struct Instance {
    id: String,
    demand: Allocation,
    host: Option<String>,
}

impl Instance {
    /// Create an unhosted instance with a copy of the given demand.
    pub fn new(id: impl Into<String>, demand: &Allocation) -> GroveResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GroveError::BadInput("empty instance id".to_string()));
        }
        if demand.is_empty() {
            return Err(GroveError::BadInput(format!(
                "instance {id} has no resource demand"
            )));
        }
        Ok(Self {
            id,
            demand: demand.clone(),
            host: None,
        })
    }

    /// The unique id of this instance.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The resource demand of this instance.
    pub fn demand(&self) -> &Allocation {
        &self.demand
    }

    /// The id of the hosting host, if hosted.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub(crate) fn set_host(&mut self, host: Option<String>) {
        self.host = host;
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "instance {}: demand={}; host={}",
            self.id,
            self.demand,
            self.host.as_deref().unwrap_or("none")
        )
    }
}

/// A group of homogeneous instances, kept in insertion order.
#[derive(Debug, Clone)]
pub struct InstanceGroup {
    id: String,
    demand: Allocation,
    members: Vec<Instance>,
}

impl InstanceGroup {
    /// Create a group of `size` instances named `<id>-vm<i>`.
    pub fn new(id: impl Into<String>, size: usize, demand: &Allocation) -> GroveResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GroveError::BadInput("empty group id".to_string()));
        }
        if demand.is_empty() {
            return Err(GroveError::BadInput(format!(
                "group {id} has no resource demand"
            )));
        }
        let members = (0..size)
            .map(|i| Instance::new(format!("{id}-vm{i}"), demand))
            .collect::<GroveResult<Vec<_>>>()?;
        Ok(Self {
            id,
            demand: demand.clone(),
            members,
        })
    }

    /// The unique id of this group.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The homogeneous demand of the group members.
    pub fn demand(&self) -> &Allocation {
        &self.demand
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True iff the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The members in insertion order.
    pub fn members(&self) -> &[Instance] {
        &self.members
    }

    /// The members, mutably.
    pub fn members_mut(&mut self) -> &mut [Instance] {
        &mut self.members
    }

    /// Look up a member by id.
    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.members.iter().find(|m| m.id() == id)
    }

    /// Add a member. `false` if an instance with the same id exists.
    pub fn push(&mut self, instance: Instance) -> bool {
        if self.get(instance.id()).is_some() {
            return false;
        }
        self.members.push(instance);
        true
    }

    /// Remove a member by id. `false` if absent.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.members.iter().position(|m| m.id() == id) {
            Some(i) => {
                self.members.remove(i);
                true
            }
            None => false,
        }
    }

    /// Index of the first member without a host.
    pub fn next_unhosted(&self) -> Option<usize> {
        self.members.iter().position(|m| m.host().is_none())
    }

    /// Number of members currently hosted on the given host.
    pub fn num_hosted_on(&self, host_id: &str) -> i64 {
        self.members
            .iter()
            .filter(|m| m.host() == Some(host_id))
            .count() as i64
    }
}
