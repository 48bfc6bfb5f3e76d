// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Topology model for Grove.
//!
//! - **`tree`** — generic arena-backed rooted tree
//! - **`host`** — leaf resource provider (capacity, allocation, weight)
//! - **`instance`** — workload instance and homogeneous instance groups
//! - **`physical`** — the physical topology tree with resource percolation
//! - **`logical`** — the placement result tree mirroring a physical subset

pub mod host;
pub mod instance;
pub mod logical;
pub mod physical;
pub mod tree;
