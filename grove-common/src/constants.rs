// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Grove-wide constants and default identifiers.

/// Default names of topology levels, leaf-most first.
pub const DEFAULT_LEVEL_NAMES: [&str; 6] = ["server", "rack", "room", "zone", "region", "cloud"];

/// Default name of the root node.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Fallback prefix for a level beyond the named ones.
pub const DEFAULT_LEVEL_NAME: &str = "level";

/// Default host weight.
pub const DEFAULT_WEIGHT: i64 = 1;

/// Minimum host weight.
pub const MIN_WEIGHT: i64 = 1;

/// Maximum host weight.
pub const MAX_WEIGHT: i64 = 100;

/// Per-dimension fit count when a demand dimension is zero
/// (treated as "unbounded").
pub const FIT_SATURATION: i64 = i32::MAX as i64;

/// Required `kind` attribute of a topology tree document.
pub const TREE_KIND: &str = "TopologyTree";
