// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Common types for Grove: resource allocations, arithmetic helpers,
//! defaults, and the error type shared by all Grove crates.

pub mod allocation;
pub mod arith;
pub mod constants;
pub mod error;
