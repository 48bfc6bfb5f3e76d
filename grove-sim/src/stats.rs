// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Box-whisker statistics over integer samples.

use std::fmt;

/// A box-whisker summary of up to a fixed number of samples.
#[derive(Debug, Clone)]
pub struct BoxWhisker {
    data: Vec<i64>,
    capacity: usize,
    min: i64,
    max: i64,
    median: i64,
    q1: i64,
    q3: i64,
}

impl BoxWhisker {
    /// Create a collector for up to `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            min: 0,
            max: 0,
            median: 0,
            q1: 0,
            q3: 0,
        }
    }

    /// Number of collected samples.
    pub fn num_samples(&self) -> usize {
        self.data.len()
    }

    /// Add a sample; ignored once the collector is full.
    pub fn add_sample(&mut self, x: i64) {
        if self.data.len() < self.capacity {
            self.data.push(x);
        }
    }

    /// Compute min, max, median, and quartiles (all zero without samples).
    pub fn calculate(&mut self) {
        let n = self.data.len();
        if n == 0 {
            self.min = 0;
            self.max = 0;
            self.median = 0;
            self.q1 = 0;
            self.q3 = 0;
            return;
        }
        let mut sorted = self.data.clone();
        sorted.sort_unstable();
        self.min = sorted[0];
        self.max = sorted[n - 1];
        self.median = sorted[n / 2];
        self.q1 = sorted[n / 4];
        self.q3 = sorted[3 * n / 4];
    }
}

impl fmt::Display for BoxWhisker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "samples={}; median={}; min={}; max={}; q1={}; q3={}",
            self.data.len(),
            self.median,
            self.min,
            self.max,
            self.q1,
            self.q3
        )
    }
}
