// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The Grove placement engine.
//!
//! Places a group of homogeneous instances onto a physical topology tree
//! while honoring per-level structural constraints:
//!
//! - **`constraint`** — Pack/Spread affinity, hard/soft level constraints
//! - **`size_range`** — per-node feasible interval of instances to place
//! - **`group`** — placement groups and the claim/unclaim protocol
//! - **`placer`** — the recursive placement algorithm and its policies

pub mod constraint;
pub mod group;
pub mod placer;
pub mod size_range;

pub use constraint::{Affinity, LevelConstraint};
pub use group::PlacementGroup;
pub use placer::{Placer, Policy};
pub use size_range::SizeRange;
