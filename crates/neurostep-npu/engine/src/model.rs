// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model Descriptions
//!
//! A JSON description of everything a generated program declares up front:
//! arrays, clocks, pathways, networks and the built-in spike propagation
//! operations. Model-specific state updates are closures and are added in code
//! after [`ModelDescription::build`].
//!
//! A dynamic array marked `"external": true` is filled from the static
//! directory by `load_static_arrays()` and takes its length from the snapshot
//! file, so synapses can be shipped as files. A `spike_generator` operation
//! replays spikes from an index array and a time array.
//!
//! ```json
//! {
//!   "arrays": [
//!     { "name": "_array_neurons__spikespace", "dtype": "i32", "kind": "fixed", "size": 11 },
//!     { "name": "_array_neurons_i", "dtype": "i32", "kind": "fixed", "size": 10,
//!       "init": { "policy": "arange", "start": 0 } },
//!     { "name": "_dynamic_array_syn_delay", "dtype": "f64", "kind": "dynamic", "external": true }
//!   ],
//!   "clocks": [ { "name": "defaultclock", "dt": 0.0001 } ],
//!   "pathways": [
//!     { "name": "syn_pre", "source_size": 10, "target_size": 10,
//!       "delays": "_dynamic_array_syn_delay", "sources": "_dynamic_array_syn__synaptic_pre",
//!       "dt": 0.0001 }
//!   ],
//!   "networks": [
//!     { "name": "magicnetwork", "clocks": ["defaultclock"], "operations": [
//!       { "name": "syn_pre_push_spikes", "clock": "defaultclock", "type": "push_spikes",
//!         "pathway": "syn_pre", "spikespace": "_array_neurons__spikespace" }
//!     ] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use neurostep_npu_neural::DType;
use neurostep_npu_runtime::{ArrayDecl, ArrayKind, InitPolicy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigurationError, Result};
use crate::operation::{Accumulate, PushSpikes, SpikeGenerator, Weight};
use crate::simulation::Simulation;
use crate::synaptic_pathway::PathwayConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescription {
    pub arrays: Vec<ArraySpec>,
    pub clocks: Vec<ClockSpec>,
    pub pathways: Vec<PathwaySpec>,
    pub networks: Vec<NetworkSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySpec {
    pub name: String,
    pub dtype: DType,
    #[serde(flatten)]
    pub shape: ArrayShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrayShape {
    Fixed {
        size: usize,
        #[serde(default)]
        init: InitSpec,
    },
    /// Loaded from the static directory, never persisted
    Static { size: usize },
    Dynamic {
        #[serde(default)]
        len: usize,
        /// Loaded from the static directory; the snapshot sets the length
        #[serde(default)]
        external: bool,
    },
    #[serde(rename = "dynamic_2d")]
    Dynamic2D {
        #[serde(default)]
        rows: usize,
        #[serde(default)]
        row_len: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InitSpec {
    #[default]
    Zeros,
    Arange { start: i64 },
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSpec {
    pub name: String,
    /// Step in seconds
    pub dt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwaySpec {
    pub name: String,
    pub source_size: usize,
    pub target_size: usize,
    /// Name of the `f64` delay array
    pub delays: String,
    /// Name of the `i32` synapse source array
    pub sources: String,
    /// Name of the `i32` synapse target array, checked against `target_size`
    #[serde(default)]
    pub targets: Option<String>,
    pub dt: f64,
    /// `[start, stop)` within the parent population
    #[serde(default)]
    pub source_range: Option<(usize, usize)>,
    #[serde(default)]
    pub max_delay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub clocks: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub clock: String,
    #[serde(flatten)]
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    PushSpikes {
        pathway: String,
        spikespace: String,
    },
    /// Deliver due spikes as `target[post[syn]] += weight`
    DeliverSpikes {
        pathway: String,
        post: String,
        target: String,
        weight: WeightSpec,
    },
    /// Fire `indices[k]` on the tick nearest `times[k]` seconds
    SpikeGenerator {
        spikespace: String,
        indices: String,
        times: String,
    },
}

/// A number, or the name of a per-synapse `f64` weight array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSpec {
    Constant(f64),
    PerSynapse(String),
}

impl ModelDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidModel(e.to_string()).into())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidModel(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigurationError::InvalidModel(e.to_string()).into())
    }

    /// Declare everything in `sim`
    ///
    /// Arrays first, then clocks, pathways and networks, so every name a
    /// later entry refers to already exists. A network named `magicnetwork`
    /// extends the default network.
    pub fn build(&self, sim: &mut Simulation) -> Result<()> {
        for array in &self.arrays {
            sim.storage_mut().declare(array.to_decl())?;
        }
        for clock in &self.clocks {
            sim.add_clock(clock.name.clone(), clock.dt)?;
        }
        for pathway in &self.pathways {
            let storage = sim.storage();
            let mut config = PathwayConfig::new(
                pathway.name.clone(),
                pathway.source_size,
                pathway.target_size,
                storage.id(&pathway.delays)?,
                storage.id(&pathway.sources)?,
                pathway.dt,
            );
            if let Some(targets) = &pathway.targets {
                config = config.with_targets(storage.id(targets)?);
            }
            if let Some((start, stop)) = pathway.source_range {
                config = config.with_source_range(start, stop);
            }
            if let Some(max_delay) = pathway.max_delay {
                config = config.with_max_delay(max_delay);
            }
            sim.add_pathway(config)?;
        }
        for network in &self.networks {
            let id = match sim.network_id(&network.name) {
                Ok(id) => id,
                Err(_) => sim.add_network(network.name.clone())?,
            };
            for clock in &network.clocks {
                let clock = sim.clock_id(clock)?;
                sim.add_clock_to_network(id, clock)?;
            }
            for op in &network.operations {
                let clock = sim.clock_id(&op.clock)?;
                match &op.kind {
                    OperationKind::PushSpikes {
                        pathway,
                        spikespace,
                    } => {
                        let operation =
                            PushSpikes::new(sim.pathway_id(pathway)?, sim.storage().id(spikespace)?);
                        sim.add_operation(id, clock, op.name.clone(), operation)?;
                    }
                    OperationKind::DeliverSpikes {
                        pathway,
                        post,
                        target,
                        weight,
                    } => {
                        let storage = sim.storage();
                        let weight = match weight {
                            WeightSpec::Constant(w) => Weight::Constant(*w),
                            WeightSpec::PerSynapse(name) => Weight::PerSynapse(storage.id(name)?),
                        };
                        let effect = Accumulate::new(storage.id(post)?, weight, storage.id(target)?);
                        let pathway = sim.pathway_id(pathway)?;
                        sim.add_delivery(id, clock, op.name.clone(), pathway, effect)?;
                    }
                    OperationKind::SpikeGenerator {
                        spikespace,
                        indices,
                        times,
                    } => {
                        let storage = sim.storage();
                        let operation = SpikeGenerator::new(
                            storage.id(spikespace)?,
                            storage.id(indices)?,
                            storage.id(times)?,
                        );
                        sim.add_operation(id, clock, op.name.clone(), operation)?;
                    }
                }
            }
        }

        info!(
            "Built model: {} arrays, {} clocks, {} pathways, {} networks",
            self.arrays.len(),
            self.clocks.len(),
            self.pathways.len(),
            self.networks.len()
        );
        Ok(())
    }
}

impl ArraySpec {
    fn to_decl(&self) -> ArrayDecl {
        let (kind, size, row_len, init) = match self.shape {
            ArrayShape::Fixed { size, init } => {
                let init = match init {
                    InitSpec::Zeros => InitPolicy::Zeros,
                    InitSpec::Arange { start } => InitPolicy::Arange { start },
                    InitSpec::External => InitPolicy::External,
                };
                (ArrayKind::Fixed, size, 0, init)
            }
            ArrayShape::Static { size } => (ArrayKind::Static, size, 0, InitPolicy::External),
            ArrayShape::Dynamic { len, external } => {
                let init = if external {
                    InitPolicy::External
                } else {
                    InitPolicy::Zeros
                };
                (ArrayKind::Dynamic, len, 0, init)
            }
            ArrayShape::Dynamic2D { rows, row_len } => {
                (ArrayKind::Dynamic2D, rows, row_len, InitPolicy::Zeros)
            }
        };
        ArrayDecl {
            name: self.name.clone(),
            dtype: self.dtype,
            kind,
            size,
            row_len,
            init,
        }
    }
}
