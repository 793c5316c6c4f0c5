// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurostep Engine
//!
//! Time-stepped execution of a simulation:
//! - **Clock**: a fixed step on the shared integer time grid
//! - **Delay Queue**: ring buffer of per-step synapse event buckets
//! - **Synaptic Pathway**: source spikes → delayed per-synapse events
//! - **Network**: runs operations of several clocks in global time order
//! - **Simulation**: owns storage, clocks, pathways and networks
//!
//! ## Scheduling Rules
//! - The next step is the smallest current time over the network's clocks.
//! - All operations of the clocks due at that time run in the order they were
//!   added to the network, then those clocks advance.
//! - A run of duration `d` ends each clock at the first tick at or past the
//!   network's start time plus `d`; consecutive runs continue where the last
//!   one stopped.
//! - Each clock is driven by one network, and a pathway is delivered on a
//!   clock stepping at the pathway's `dt`.
//!
//! ## Usage
//!
//! ```rust
//! use neurostep_npu_engine::{Result, RuntimeState, Simulation, TickInfo};
//!
//! let mut sim = Simulation::default();
//! let clock = sim.add_clock("defaultclock", 1e-4)?;
//! let net = sim.default_network();
//! sim.add_clock_to_network(net, clock)?;
//! sim.add_operation(net, clock, "noop", |_: &mut RuntimeState, _: &TickInfo| -> Result<()> {
//!     Ok(())
//! })?;
//!
//! sim.allocate()?;
//! let summary = sim.run(net, 1e-3)?;
//! assert_eq!(summary.steps, 10);
//! sim.release();
//! # Ok::<(), neurostep_npu_engine::EngineError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod delay_queue;
pub mod error;
pub mod model;
pub mod network;
pub mod operation;
pub mod simulation;
pub mod synaptic_pathway;

pub use clock::Clock;
pub use delay_queue::DelayQueue;
pub use error::{ConfigurationError, EngineError, Result};
pub use model::ModelDescription;
pub use network::{Network, NetworkState, RunSummary};
pub use operation::{
    spikes_in, Accumulate, DeliverSpikes, Operation, PushSpikes, RuntimeState, SpikeGenerator,
    SynapticEffect, TickInfo, Weight,
};
pub use simulation::{Simulation, SimulationSettings};
pub use synaptic_pathway::{PathwayConfig, SynapticPathway};
