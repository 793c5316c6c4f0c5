// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurostep
//!
//! Runtime core for code-generated, time-stepped spiking neural network
//! simulations. Generated model code declares its arrays, clocks, synaptic
//! pathways and per-step operations; this crate stores the state, schedules
//! the operations across clocks and delivers delayed spikes.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neurostep = "0.1"
//! ```
//!
//! ```rust,no_run
//! use neurostep::prelude::*;
//!
//! let mut sim = Simulation::default();
//! let clock = sim.add_clock("defaultclock", 0.1e-3)?;
//! let v = sim
//!     .storage_mut()
//!     .declare_fixed(array_name("neurongroup", "v"), DType::F64, 100, InitPolicy::Zeros)?;
//!
//! let net = sim.default_network();
//! sim.add_clock_to_network(net, clock)?;
//! sim.add_operation(net, clock, "stateupdater", move |state: &mut RuntimeState, info: &TickInfo| -> EngineResult<()> {
//!     for x in state.storage_mut().fixed_mut::<f64>(v)? {
//!         *x += info.dt;
//!     }
//!     Ok(())
//! })?;
//!
//! // allocate → load static arrays → run → persist → release
//! sim.execute(net, 1.0)?;
//! # Ok::<(), EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: neurostep-npu-neural                       │
//! │  (ids, element types, time grid, array naming)          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  State: neurostep-npu-runtime                           │
//! │  (storage manager, snapshots)                           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Execution: neurostep-npu-engine                        │
//! │  (clocks, delay queues, pathways, network scheduler)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! `neurostep-config` and `neurostep-observability` sit beside the stack and
//! are used by the standalone runner.
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use neurostep_npu_neural as neural;

// Re-export state and execution
pub use neurostep_npu_engine as engine;
pub use neurostep_npu_runtime as runtime;

// Re-export ambient crates
pub use neurostep_config as config;
pub use neurostep_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::neural::{
        array_name, dynamic_array_name, ArrayId, ClockId, DType, Element, NetworkId, PathwayId,
        TimeGrid,
    };

    pub use crate::runtime::{InitPolicy, LoadReport, PersistReport, StorageError, StorageManager};

    pub use crate::engine::{
        Accumulate, ConfigurationError, DeliverSpikes, EngineError, ModelDescription, Operation,
        PathwayConfig, PushSpikes, RunSummary, RuntimeState, Simulation, SimulationSettings,
        SpikeGenerator, SynapticEffect, TickInfo, Weight,
    };

    /// Engine result alias, named apart from `std::result::Result`
    pub type EngineResult<T> = crate::engine::Result<T>;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let sim = Simulation::default();
        assert_eq!(sim.network(sim.default_network()).unwrap().name(), "magicnetwork");
        assert_eq!(array_name("neurongroup", "v"), "_array_neurongroup_v");
    }
}
