// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the scheduling engine
//!
//! `ConfigurationError`s are detected during setup and are fatal: nothing has
//! ticked yet when they are returned. `EngineError` is everything a setup or
//! run call can fail with.

use neurostep_npu_neural::{ClockId, NetworkId, PathwayId, TimeError};
use neurostep_npu_runtime::StorageError;

/// Setup-time configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid time grid: {0}")]
    TimeGrid(TimeError),

    #[error("clock '{name}': {source}")]
    InvalidClock {
        name: String,
        #[source]
        source: TimeError,
    },

    #[error("invalid run duration: {0}")]
    InvalidDuration(TimeError),

    #[error("unknown clock {0}")]
    UnknownClock(ClockId),

    #[error("unknown pathway {0}")]
    UnknownPathway(PathwayId),

    #[error("unknown network {0}")]
    UnknownNetwork(NetworkId),

    #[error("no {kind} named '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("a {kind} named '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("operation '{operation}' is bound to {clock}, which network '{network}' does not drive")]
    UnboundOperation {
        network: String,
        operation: String,
        clock: ClockId,
    },

    #[error("delay queue needs at least one slot")]
    EmptyQueue,

    #[error("delay of {delay} steps does not fit a queue of {slots} slots")]
    DelayOutOfRange { delay: usize, slots: usize },

    #[error("pathway '{pathway}': synapse {synapse} has delay {delay_steps} steps, queue holds at most {max_steps}")]
    DelayExceedsCapacity {
        pathway: String,
        synapse: usize,
        delay_steps: u64,
        max_steps: u64,
    },

    #[error("pathway '{pathway}': synapse {synapse} has invalid delay {delay}")]
    InvalidDelay {
        pathway: String,
        synapse: usize,
        delay: f64,
    },

    #[error("pathway '{pathway}': invalid maximum delay {max_delay}")]
    InvalidMaxDelay { pathway: String, max_delay: f64 },

    #[error("pathway '{pathway}': step size must be finite and positive, got {dt}")]
    InvalidPathwayStep { pathway: String, dt: f64 },

    #[error("pathway '{pathway}': synapse {synapse} has source {source_index}, outside 0..{source_size}")]
    SynapseSourceOutOfRange {
        pathway: String,
        synapse: usize,
        source_index: i64,
        source_size: usize,
    },

    #[error("pathway '{pathway}': {delays} delays for {sources} synapse sources")]
    ArrayLengthMismatch {
        pathway: String,
        delays: usize,
        sources: usize,
    },

    #[error("pathway '{pathway}': source range {start}..{stop} does not span {source_size} units")]
    InvalidSubgroupRange {
        pathway: String,
        start: usize,
        stop: usize,
        source_size: usize,
    },

    #[error("pathway '{pathway}' delivers every {pathway_dt} s but is bound to clock '{clock}' stepping every {clock_dt} s")]
    PathwayClockMismatch {
        pathway: String,
        pathway_dt: f64,
        clock: String,
        clock_dt: f64,
    },

    #[error("clock '{clock}' is already driven by network '{network}'")]
    ClockAlreadyDriven { clock: String, network: String },

    #[error("pathway '{pathway}': synapse {synapse} has target {target_index}, outside 0..{target_size}")]
    SynapseTargetOutOfRange {
        pathway: String,
        synapse: usize,
        target_index: i64,
        target_size: usize,
    },

    #[error("pathway '{pathway}': {targets} synapse targets for {sources} synapse sources")]
    TargetLengthMismatch {
        pathway: String,
        targets: usize,
        sources: usize,
    },

    #[error("invalid model description: {0}")]
    InvalidModel(String),
}

/// Errors from setup and run calls
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("storage must be allocated before running")]
    NotAllocated,

    #[error("storage has been released")]
    Released,

    #[error("network '{0}' is already running")]
    AlreadyRunning(String),

    #[error("pathway '{0}' has not been prepared")]
    PathwayNotPrepared(String),

    #[error("spikespace '{name}' reports {count} spikes but holds at most {capacity}")]
    InvalidSpikespace {
        name: String,
        count: i64,
        capacity: usize,
    },

    #[error("operation '{operation}' failed at {clock} tick {tick}: {source}")]
    OperationFailed {
        operation: String,
        clock: ClockId,
        tick: u64,
        #[source]
        source: Box<EngineError>,
    },

    #[error("{0}")]
    Operation(String),
}

impl EngineError {
    /// Setup errors are reported before any tick runs
    pub fn is_configuration_error(&self) -> bool {
        match self {
            EngineError::Configuration(_) => true,
            EngineError::OperationFailed { source, .. } => source.is_configuration_error(),
            _ => false,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
