// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Grove error types.

use thiserror::Error;

/// Errors surfaced by the placement engine and its builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroveError {
    /// Malformed caller input: empty id, empty demand, mismatched
    /// allocation sizes, unknown tree kind, bad generator parameters.
    #[error("invalid input: {0}")]
    BadInput(String),

    /// The physical tree has no root.
    #[error("physical tree has no root")]
    EmptyTree,

    /// The placement group has no members.
    #[error("placement group has no members")]
    EmptyGroup,

    /// Partial placement was requested without a prior logical tree.
    #[error("no prior placement to repair")]
    NoPartialState,

    /// A prior logical tree claims more instances than the group size.
    #[error("claimed count {claimed} exceeds group size {size}")]
    Overcommitted { claimed: i64, size: i64 },

    /// The recursion placed nothing at the root.
    #[error("placement failed at the root")]
    PlacementFailed,
}

/// Convenience alias for `Result<T, GroveError>`.
pub type GroveResult<T> = Result<T, GroveError>;
