// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simulation Context
//!
//! One `Simulation` owns everything a run needs: the storage manager, the
//! clocks, the synaptic pathways and the networks that drive them. It is
//! built once during setup and passed by reference wherever state is needed.
//!
//! ## Lifecycle
//! ```text
//! declare arrays / clocks / pathways / operations
//!   → allocate() → load_static_arrays() → run(network, duration)*
//!   → persist() → release()
//! ```
//! `execute()` performs the whole sequence for one run.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use neurostep_config::NeurostepConfig;
use neurostep_npu_neural::{ClockId, NetworkId, PathwayId, TimeGrid, DEFAULT_NETWORK_NAME};
use neurostep_npu_runtime::{LoadReport, PersistReport, StorageManager, StorageState};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{ConfigurationError, EngineError, Result};
use crate::network::{check_delivery_clock, Network, RunSummary};
use crate::operation::{DeliverSpikes, Operation, RuntimeState, SynapticEffect};
use crate::synaptic_pathway::{PathwayConfig, SynapticPathway};

/// Snapshot locations and queue defaults
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub static_dir: PathBuf,
    pub results_dir: PathBuf,
    pub create_results_dir: bool,
    /// Applied to pathways declared without their own maximum delay
    pub default_max_delay: Option<f64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static_arrays"),
            results_dir: PathBuf::from("results"),
            create_results_dir: true,
            default_max_delay: None,
        }
    }
}

pub struct Simulation {
    state: RuntimeState,
    grid: TimeGrid,
    settings: SimulationSettings,
    networks: Vec<Network>,
    network_names: AHashMap<String, NetworkId>,
    clock_names: AHashMap<String, ClockId>,
    pathway_names: AHashMap<String, PathwayId>,
}

impl Simulation {
    /// Empty simulation with the default network
    pub fn new(grid: TimeGrid, settings: SimulationSettings) -> Self {
        let mut sim = Self {
            state: RuntimeState::new(),
            grid,
            settings,
            networks: Vec::new(),
            network_names: AHashMap::new(),
            clock_names: AHashMap::new(),
            pathway_names: AHashMap::new(),
        };
        sim.networks.push(Network::new(DEFAULT_NETWORK_NAME));
        sim.network_names
            .insert(DEFAULT_NETWORK_NAME.to_string(), NetworkId(0));
        sim
    }

    /// Simulation configured from the `scheduler`, `snapshot` and `queue` sections
    pub fn from_config(config: &NeurostepConfig) -> Result<Self> {
        let grid = TimeGrid::new(
            config.scheduler.time_quantum,
            config.scheduler.commensurability_tolerance,
        )
        .map_err(ConfigurationError::TimeGrid)?;
        let settings = SimulationSettings {
            static_dir: config.snapshot.static_dir.clone(),
            results_dir: config.snapshot.results_dir.clone(),
            create_results_dir: config.snapshot.create_results_dir,
            default_max_delay: config.queue.default_max_delay,
        };
        Ok(Self::new(grid, settings))
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    pub fn storage(&self) -> &StorageManager {
        &self.state.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageManager {
        &mut self.state.storage
    }

    // ---------------------------------------------------------------------
    // Clocks
    // ---------------------------------------------------------------------

    pub fn add_clock(&mut self, name: impl Into<String>, dt: f64) -> Result<ClockId> {
        let name = name.into();
        if self.clock_names.contains_key(&name) {
            return Err(ConfigurationError::DuplicateName { kind: "clock", name }.into());
        }
        let clock = Clock::new(name.clone(), dt, &self.grid)?;
        let id = ClockId(self.state.clocks.len() as u32);
        self.state.clocks.push(clock);
        self.clock_names.insert(name, id);
        Ok(id)
    }

    pub fn clock(&self, id: ClockId) -> Result<&Clock> {
        self.state.clock(id)
    }

    pub fn clock_id(&self, name: &str) -> Result<ClockId> {
        lookup(&self.clock_names, "clock", name)
    }

    // ---------------------------------------------------------------------
    // Pathways
    // ---------------------------------------------------------------------

    pub fn add_pathway(&mut self, mut config: PathwayConfig) -> Result<PathwayId> {
        if self.pathway_names.contains_key(&config.name) {
            return Err(ConfigurationError::DuplicateName {
                kind: "pathway",
                name: config.name,
            }
            .into());
        }
        if config.max_delay.is_none() {
            config.max_delay = self.settings.default_max_delay;
        }
        let name = config.name.clone();
        let pathway = SynapticPathway::new(config)?;
        let id = PathwayId(self.state.pathways.len() as u32);
        self.state.pathways.push(pathway);
        self.pathway_names.insert(name, id);
        Ok(id)
    }

    pub fn pathway(&self, id: PathwayId) -> Result<&SynapticPathway> {
        self.state.pathway(id)
    }

    pub fn pathway_id(&self, name: &str) -> Result<PathwayId> {
        lookup(&self.pathway_names, "pathway", name)
    }

    // ---------------------------------------------------------------------
    // Networks
    // ---------------------------------------------------------------------

    /// The network every simulation starts with (`magicnetwork`)
    pub fn default_network(&self) -> NetworkId {
        NetworkId(0)
    }

    pub fn add_network(&mut self, name: impl Into<String>) -> Result<NetworkId> {
        let name = name.into();
        if self.network_names.contains_key(&name) {
            return Err(ConfigurationError::DuplicateName { kind: "network", name }.into());
        }
        let id = NetworkId(self.networks.len() as u32);
        self.networks.push(Network::new(name.clone()));
        self.network_names.insert(name, id);
        Ok(id)
    }

    pub fn network(&self, id: NetworkId) -> Result<&Network> {
        self.networks
            .get(id.index())
            .ok_or_else(|| ConfigurationError::UnknownNetwork(id).into())
    }

    pub fn network_mut(&mut self, id: NetworkId) -> Result<&mut Network> {
        self.networks
            .get_mut(id.index())
            .ok_or_else(|| ConfigurationError::UnknownNetwork(id).into())
    }

    pub fn network_id(&self, name: &str) -> Result<NetworkId> {
        lookup(&self.network_names, "network", name)
    }

    /// Let `network` drive `clock`
    ///
    /// Each clock belongs to at most one network; adding it to the same
    /// network again is a no-op.
    pub fn add_clock_to_network(&mut self, network: NetworkId, clock: ClockId) -> Result<()> {
        let name = self.state.clock(clock)?.name().to_string();
        self.network(network)?;
        if let Some(owner) = self
            .networks
            .iter()
            .enumerate()
            .find(|(i, net)| *i != network.index() && net.clocks().contains(&clock))
        {
            return Err(ConfigurationError::ClockAlreadyDriven {
                clock: name,
                network: owner.1.name().to_string(),
            }
            .into());
        }
        self.network_mut(network)?.add_clock(clock);
        Ok(())
    }

    /// Append an operation to `network`, bound to `clock`
    pub fn add_operation(
        &mut self,
        network: NetworkId,
        clock: ClockId,
        name: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Result<()> {
        self.state.clock(clock)?;
        if let Some(pathway) = operation.delivers() {
            check_delivery_clock(&self.state, &self.grid, clock, pathway)?;
        }
        self.network_mut(network)?
            .add_operation(clock, name, operation)
            .map_err(EngineError::from)
    }

    /// Deliver `pathway`'s due spikes through `effect` on every tick of `clock`
    ///
    /// `clock` must step at the pathway's `dt`.
    pub fn add_delivery(
        &mut self,
        network: NetworkId,
        clock: ClockId,
        name: impl Into<String>,
        pathway: PathwayId,
        effect: impl SynapticEffect + 'static,
    ) -> Result<()> {
        self.add_operation(network, clock, name, DeliverSpikes::new(pathway, effect))
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn allocate(&mut self) -> Result<()> {
        Ok(self.state.storage.allocate()?)
    }

    /// Load every externally initialised array from the static directory
    pub fn load_static_arrays(&mut self) -> Result<LoadReport> {
        let dir = self.settings.static_dir.clone();
        Ok(self.state.storage.load_static_arrays(&dir)?)
    }

    /// Prepare every pathway from the current synapse arrays
    pub fn prepare_pathways(&mut self) -> Result<()> {
        let RuntimeState {
            storage, pathways, ..
        } = &mut self.state;
        for pathway in pathways.iter_mut() {
            pathway.prepare(storage)?;
        }
        Ok(())
    }

    /// Prepare pathways and run `network` for `duration` seconds
    ///
    /// # Errors
    ///
    /// `NotAllocated` before `allocate()`, `Released` after `release()`.
    pub fn run(&mut self, network: NetworkId, duration: f64) -> Result<RunSummary> {
        match self.state.storage.state() {
            StorageState::Allocated => {}
            StorageState::Declared => return Err(EngineError::NotAllocated),
            StorageState::Released => return Err(EngineError::Released),
        }
        if network.index() >= self.networks.len() {
            return Err(ConfigurationError::UnknownNetwork(network).into());
        }
        self.prepare_pathways()?;
        self.networks[network.index()].run(&mut self.state, &self.grid, duration)
    }

    /// Write every fixed and dynamic array to the results directory
    pub fn persist(&self) -> Result<PersistReport> {
        self.persist_to(&self.settings.results_dir)
    }

    pub fn persist_to(&self, dir: &Path) -> Result<PersistReport> {
        Ok(self
            .state
            .storage
            .persist_all(dir, self.settings.create_results_dir)?)
    }

    /// Free all arrays; safe to call repeatedly
    pub fn release(&mut self) -> bool {
        self.state.storage.release()
    }

    /// allocate → load static arrays → run → persist → release
    ///
    /// Snapshot failures are logged and do not stop the sequence. On a run
    /// error the storage is released and the error returned.
    pub fn execute(&mut self, network: NetworkId, duration: f64) -> Result<RunSummary> {
        self.allocate()?;
        let loaded = self.load_static_arrays()?;
        if !loaded.is_complete() {
            warn!("{} static arrays could not be loaded", loaded.failed.len());
        }

        let summary = match self.run(network, duration) {
            Ok(summary) => summary,
            Err(err) => {
                self.release();
                return Err(err);
            }
        };

        let persisted = self.persist()?;
        if !persisted.is_complete() {
            warn!("{} arrays could not be persisted", persisted.failed.len());
        }
        self.debug_report();
        self.release();
        Ok(summary)
    }

    /// Log and return the current synapse count of every pathway
    pub fn debug_report(&self) -> Vec<(String, usize)> {
        let mut report = Vec::with_capacity(self.state.pathways.len());
        for pathway in &self.state.pathways {
            match pathway.synapse_count(&self.state.storage) {
                Ok(count) => {
                    info!("Pathway '{}': Number of synapses: {}", pathway.name(), count);
                    report.push((pathway.name().to_string(), count));
                }
                Err(err) => warn!("Pathway '{}': synapse count unavailable: {}", pathway.name(), err),
            }
        }
        report
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(TimeGrid::default(), SimulationSettings::default())
    }
}

fn lookup<T: Copy>(names: &AHashMap<String, T>, kind: &'static str, name: &str) -> Result<T> {
    names.get(name).copied().ok_or_else(|| {
        ConfigurationError::UnknownName {
            kind,
            name: name.to_string(),
        }
        .into()
    })
}
