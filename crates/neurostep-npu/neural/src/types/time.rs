// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integer time grid
//!
//! Simulated time is never accumulated in floating point. Every clock step and
//! every scheduled instant is an integer number of quanta; two clocks tick at
//! the same instant exactly when their integer tick times are equal.

use serde::{Deserialize, Serialize};

/// Errors converting real-valued times onto the grid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    #[error("time quantum must be finite and positive, got {0}")]
    InvalidQuantum(f64),

    #[error("commensurability tolerance must be in (0, 1), got {0}")]
    InvalidTolerance(f64),

    #[error("step size must be finite and positive, got {0}")]
    InvalidStep(f64),

    #[error("step size {step} is not a whole multiple of the time quantum {quantum}")]
    NotCommensurate { step: f64, quantum: f64 },

    #[error("duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),
}

/// The grid all clocks share: `quantum` seconds per integer unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    quantum: f64,
    tolerance: f64,
}

impl TimeGrid {
    /// Nanosecond grid with a relative tolerance of 1e-6
    pub const DEFAULT_QUANTUM: f64 = 1e-9;
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;

    pub fn new(quantum: f64, tolerance: f64) -> Result<Self, TimeError> {
        if !(quantum.is_finite() && quantum > 0.0) {
            return Err(TimeError::InvalidQuantum(quantum));
        }
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(TimeError::InvalidTolerance(tolerance));
        }
        Ok(Self { quantum, tolerance })
    }

    pub fn quantum(&self) -> f64 {
        self.quantum
    }

    /// Express a clock step on the grid
    ///
    /// The step must be a whole, non-zero number of quanta within the relative
    /// tolerance.
    pub fn step_to_quanta(&self, step: f64) -> Result<u64, TimeError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(TimeError::InvalidStep(step));
        }
        let ratio = step / self.quantum;
        let whole = ratio.round();
        if whole < 1.0 || (ratio - whole).abs() > self.tolerance * whole || whole > u64::MAX as f64 {
            return Err(TimeError::NotCommensurate {
                step,
                quantum: self.quantum,
            });
        }
        Ok(whole as u64)
    }

    /// Express a run duration on the grid, rounding to the nearest quantum
    pub fn duration_to_quanta(&self, duration: f64) -> Result<u64, TimeError> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(TimeError::InvalidDuration(duration));
        }
        let whole = (duration / self.quantum).round();
        if whole > u64::MAX as f64 {
            return Err(TimeError::InvalidDuration(duration));
        }
        Ok(whole as u64)
    }

    pub fn to_seconds(&self, quanta: u64) -> f64 {
        quanta as f64 * self.quantum
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            quantum: Self::DEFAULT_QUANTUM,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// Convert a delay in time units to a whole number of steps of `dt`
///
/// Rounds half away from zero. Returns `None` for negative or non-finite
/// delays and for a non-positive `dt`.
pub fn delay_to_steps(delay: f64, dt: f64) -> Option<u64> {
    if !(delay.is_finite() && delay >= 0.0 && dt.is_finite() && dt > 0.0) {
        return None;
    }
    let steps = (delay / dt).round();
    if steps > u64::MAX as f64 {
        return None;
    }
    Some(steps as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_to_quanta() {
        let grid = TimeGrid::default();
        assert_eq!(grid.step_to_quanta(1e-4).unwrap(), 100_000);
        assert_eq!(grid.step_to_quanta(0.1e-3).unwrap(), 100_000);
        assert_eq!(grid.step_to_quanta(1.0).unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_step_rejections() {
        let grid = TimeGrid::new(1e-3, 1e-6).unwrap();
        assert_eq!(grid.step_to_quanta(0.0), Err(TimeError::InvalidStep(0.0)));
        assert!(matches!(grid.step_to_quanta(f64::NAN), Err(TimeError::InvalidStep(_))));
        assert!(matches!(
            grid.step_to_quanta(1.5e-3),
            Err(TimeError::NotCommensurate { .. })
        ));
        assert!(matches!(
            grid.step_to_quanta(1e-4),
            Err(TimeError::NotCommensurate { .. })
        ));
    }

    #[test]
    fn test_invalid_grid() {
        assert_eq!(TimeGrid::new(0.0, 1e-6), Err(TimeError::InvalidQuantum(0.0)));
        assert_eq!(TimeGrid::new(1e-9, 1.0), Err(TimeError::InvalidTolerance(1.0)));
    }

    #[test]
    fn test_duration_rounds_to_nearest_quantum() {
        let grid = TimeGrid::default();
        // 0.5 ms is not exact in binary floating point
        assert_eq!(grid.duration_to_quanta(0.5e-3).unwrap(), 500_000);
        assert_eq!(grid.duration_to_quanta(0.0).unwrap(), 0);
        assert!(grid.duration_to_quanta(-1.0).is_err());
        assert!(grid.duration_to_quanta(f64::INFINITY).is_err());
    }

    #[test]
    fn test_delay_to_steps() {
        assert_eq!(delay_to_steps(0.5e-3, 0.1e-3), Some(5));
        assert_eq!(delay_to_steps(0.0, 0.1e-3), Some(0));
        assert_eq!(delay_to_steps(0.26, 0.1), Some(3));
        assert_eq!(delay_to_steps(0.24, 0.1), Some(2));
        assert_eq!(delay_to_steps(-0.1, 0.1), None);
        assert_eq!(delay_to_steps(1.0, 0.0), None);
    }
}
