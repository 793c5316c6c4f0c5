// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synaptic Pathway
//!
//! Carries spikes from a source population to a target population with a
//! per-synapse delay. On a source tick the pathway pushes every outgoing
//! synapse of every spiking source unit into its delay queue; on a delivery
//! tick it exposes the synapse indices due now, then advances the queue.
//!
//! ## Preparation
//! Delays are stored in time units in a storage array. `prepare()` converts
//! them to queue steps (`round(delay / dt)`), validates them, sizes the queue,
//! and builds the source → synapses index. It runs before every run, so
//! synapses created between runs are picked up; spikes still in flight keep
//! their remaining delay.
//!
//! ## Subgroups
//! Spike indices refer to the parent population. Only indices in
//! `[source_start, source_stop)` belong to this pathway, shifted by
//! `-source_start` before the synapse lookup.

use neurostep_npu_neural::{delay_to_steps, ArrayId};
use neurostep_npu_runtime::StorageManager;
use tracing::debug;

use crate::delay_queue::DelayQueue;
use crate::error::{ConfigurationError, EngineError, Result};

/// Setup description of one pathway
#[derive(Debug, Clone, PartialEq)]
pub struct PathwayConfig {
    pub name: String,
    /// Units in the source (sub)population
    pub source_size: usize,
    /// Units in the target population
    pub target_size: usize,
    /// `f64` per-synapse delays in seconds (1-D array)
    pub delays: ArrayId,
    /// `i32` per-synapse source index, relative to `source_start` (1-D array)
    pub sources: ArrayId,
    /// `i32` per-synapse target index; checked against `target_size` when set
    pub targets: Option<ArrayId>,
    /// Delivery step in seconds
    pub dt: f64,
    pub source_start: usize,
    pub source_stop: usize,
    /// Largest delay the queue must hold; sized from the data when `None`
    pub max_delay: Option<f64>,
}

impl PathwayConfig {
    /// Pathway over a whole source population
    pub fn new(
        name: impl Into<String>,
        source_size: usize,
        target_size: usize,
        delays: ArrayId,
        sources: ArrayId,
        dt: f64,
    ) -> Self {
        Self {
            name: name.into(),
            source_size,
            target_size,
            delays,
            sources,
            targets: None,
            dt,
            source_start: 0,
            source_stop: source_size,
            max_delay: None,
        }
    }

    /// Restrict the source to `[start, stop)` of a parent population
    pub fn with_source_range(mut self, start: usize, stop: usize) -> Self {
        self.source_start = start;
        self.source_stop = stop;
        self
    }

    pub fn with_targets(mut self, targets: ArrayId) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_max_delay(mut self, max_delay: f64) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

pub struct SynapticPathway {
    config: PathwayConfig,
    queue: Option<DelayQueue>,
    delay_steps: Vec<u32>,
    synapses_by_source: Vec<Vec<u32>>,
}

impl SynapticPathway {
    pub fn new(config: PathwayConfig) -> std::result::Result<Self, ConfigurationError> {
        if !(config.dt.is_finite() && config.dt > 0.0) {
            return Err(ConfigurationError::InvalidPathwayStep {
                pathway: config.name,
                dt: config.dt,
            });
        }
        if config.source_start > config.source_stop
            || config.source_stop - config.source_start != config.source_size
        {
            return Err(ConfigurationError::InvalidSubgroupRange {
                pathway: config.name,
                start: config.source_start,
                stop: config.source_stop,
                source_size: config.source_size,
            });
        }
        if let Some(max_delay) = config.max_delay {
            if delay_to_steps(max_delay, config.dt).is_none() {
                return Err(ConfigurationError::InvalidMaxDelay {
                    pathway: config.name,
                    max_delay,
                });
            }
        }
        Ok(Self {
            config,
            queue: None,
            delay_steps: Vec::new(),
            synapses_by_source: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PathwayConfig {
        &self.config
    }

    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    pub fn is_prepared(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of synapses currently in storage
    pub fn synapse_count(&self, storage: &StorageManager) -> Result<usize> {
        Ok(storage.len(self.config.sources)?)
    }

    /// Queue slots after the last `prepare()`
    pub fn queue_slots(&self) -> Option<usize> {
        self.queue.as_ref().map(DelayQueue::num_slots)
    }

    /// Convert delays, validate synapses, size the queue and index synapses by source
    ///
    /// # Errors
    ///
    /// Any invalid delay, source index or target index is a
    /// `ConfigurationError`; the pathway keeps its previous preparation in
    /// that case.
    pub fn prepare(&mut self, storage: &StorageManager) -> Result<()> {
        let name = &self.config.name;
        let delays = storage.slice::<f64>(self.config.delays)?;
        let sources = storage.slice::<i32>(self.config.sources)?;
        if delays.len() != sources.len() {
            return Err(ConfigurationError::ArrayLengthMismatch {
                pathway: name.clone(),
                delays: delays.len(),
                sources: sources.len(),
            }
            .into());
        }
        if let Some(targets) = self.config.targets {
            self.check_targets(storage.slice::<i32>(targets)?, sources.len())?;
        }

        let capacity_steps = match self.config.max_delay {
            Some(max_delay) => Some(delay_to_steps(max_delay, self.config.dt).ok_or_else(|| {
                ConfigurationError::InvalidMaxDelay {
                    pathway: name.clone(),
                    max_delay,
                }
            })?),
            None => None,
        };

        let mut delay_steps = Vec::with_capacity(delays.len());
        let mut synapses_by_source = vec![Vec::new(); self.config.source_size];
        let mut max_steps = 0u64;

        for (synapse, (&delay, &source)) in delays.iter().zip(sources).enumerate() {
            let steps = delay_to_steps(delay, self.config.dt)
                .filter(|&s| s <= u32::MAX as u64)
                .ok_or_else(|| ConfigurationError::InvalidDelay {
                    pathway: name.clone(),
                    synapse,
                    delay,
                })?;
            if let Some(cap) = capacity_steps {
                if steps > cap {
                    return Err(ConfigurationError::DelayExceedsCapacity {
                        pathway: name.clone(),
                        synapse,
                        delay_steps: steps,
                        max_steps: cap,
                    }
                    .into());
                }
            }
            if source < 0 || source as usize >= self.config.source_size {
                return Err(ConfigurationError::SynapseSourceOutOfRange {
                    pathway: name.clone(),
                    synapse,
                    source_index: source as i64,
                    source_size: self.config.source_size,
                }
                .into());
            }

            max_steps = max_steps.max(steps);
            delay_steps.push(steps as u32);
            synapses_by_source[source as usize].push(synapse as u32);
        }

        let slots = capacity_steps.unwrap_or(max_steps) as usize + 1;
        let queue = match &self.queue {
            // Spikes in flight keep their remaining delay
            Some(existing) => existing.resized(slots.max(existing.num_slots()))?,
            None => DelayQueue::new(slots)?,
        };

        debug!(
            "Prepared pathway '{}': {} synapses, {} queue slots",
            name,
            delay_steps.len(),
            queue.num_slots()
        );

        self.queue = Some(queue);
        self.delay_steps = delay_steps;
        self.synapses_by_source = synapses_by_source;
        Ok(())
    }

    fn check_targets(&self, targets: &[i32], synapses: usize) -> std::result::Result<(), ConfigurationError> {
        if targets.len() != synapses {
            return Err(ConfigurationError::TargetLengthMismatch {
                pathway: self.config.name.clone(),
                targets: targets.len(),
                sources: synapses,
            });
        }
        match targets
            .iter()
            .enumerate()
            .find(|(_, &t)| t < 0 || t as usize >= self.config.target_size)
        {
            Some((synapse, &target)) => Err(ConfigurationError::SynapseTargetOutOfRange {
                pathway: self.config.name.clone(),
                synapse,
                target_index: target as i64,
                target_size: self.config.target_size,
            }),
            None => Ok(()),
        }
    }

    /// Schedule every outgoing synapse of the spiking units
    ///
    /// `spikes` holds parent-population indices; those outside the source
    /// range are ignored. Returns the number of synapses pushed.
    pub fn push_spikes(&mut self, spikes: &[i32]) -> Result<usize> {
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| EngineError::PathwayNotPrepared(self.config.name.clone()))?;

        let start = self.config.source_start as i64;
        let stop = self.config.source_stop as i64;
        let mut pushed = 0;
        for &spike in spikes {
            let spike = spike as i64;
            if spike < start || spike >= stop {
                continue;
            }
            let local = (spike - start) as usize;
            for &synapse in &self.synapses_by_source[local] {
                queue.push(synapse, self.delay_steps[synapse as usize] as usize)?;
                pushed += 1;
            }
        }
        Ok(pushed)
    }

    /// Synapse indices whose event is due at the current delivery step
    pub fn peek_due(&self) -> Result<&[u32]> {
        self.queue
            .as_ref()
            .map(DelayQueue::peek_due)
            .ok_or_else(|| EngineError::PathwayNotPrepared(self.config.name.clone()))
    }

    /// Move to the next delivery step
    pub fn advance(&mut self) -> Result<()> {
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| EngineError::PathwayNotPrepared(self.config.name.clone()))?;
        queue.advance();
        Ok(())
    }

    /// Events pushed but not yet delivered
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, DelayQueue::pending)
    }
}
