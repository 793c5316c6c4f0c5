// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Clock: an independent discrete time base
//!
//! A clock's step is stored as an integer number of time-grid quanta, so the
//! time of tick `n` is `n * dt_quanta` exactly. Whether a clock is due is
//! decided on those integers, never on floating-point time.

use neurostep_npu_neural::TimeGrid;

use crate::error::ConfigurationError;

#[derive(Debug, Clone)]
pub struct Clock {
    name: String,
    dt: f64,
    dt_quanta: u64,
    tick: u64,
    end_tick: u64,
}

impl Clock {
    /// Create a clock with step `dt` seconds
    ///
    /// # Errors
    ///
    /// `InvalidClock` if `dt` is not positive or not a whole number of grid quanta.
    pub fn new(name: impl Into<String>, dt: f64, grid: &TimeGrid) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let dt_quanta = grid
            .step_to_quanta(dt)
            .map_err(|source| ConfigurationError::InvalidClock {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            dt,
            dt_quanta,
            tick: 0,
            end_tick: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step size in seconds
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Step size in grid quanta
    pub fn dt_quanta(&self) -> u64 {
        self.dt_quanta
    }

    pub fn tick_index(&self) -> u64 {
        self.tick
    }

    /// Simulated time of the current tick in seconds
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    /// Grid time of the current tick
    pub fn tick_time(&self) -> u64 {
        self.tick.saturating_mul(self.dt_quanta)
    }

    pub fn is_due(&self, global_quanta: u64) -> bool {
        self.tick_time() == global_quanta
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn end_tick(&self) -> u64 {
        self.end_tick
    }

    /// True while the clock has ticks left in the current run
    pub fn is_active(&self) -> bool {
        self.tick < self.end_tick
    }

    /// Run until the first tick at or after grid time `end_quanta`
    ///
    /// The end tick is `ceil(end / dt)`, never earlier than the current tick.
    /// For a clock whose current tick time is the run's start time this is
    /// `current + ceil(duration / dt)`.
    pub fn set_end_at(&mut self, end_quanta: u64) {
        self.end_tick = end_quanta.div_ceil(self.dt_quanta).max(self.tick);
    }
}
