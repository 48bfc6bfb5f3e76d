// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Builders producing physical topology trees for the placement engine:
//! parametric generators and a JSON topology reader.

pub mod gen;
pub mod json;

pub use gen::{flat_topology, uniform_grouped_tree, uniform_tree};
pub use json::tree_from_json;
