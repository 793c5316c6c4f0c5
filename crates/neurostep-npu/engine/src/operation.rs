// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-step operations and the state they run against
//!
//! Everything a network runs is an [`Operation`] bound to one clock. The
//! state update and threshold code of a model comes from outside as closures;
//! spike propagation uses the built-in [`PushSpikes`] and [`DeliverSpikes`],
//! and [`SpikeGenerator`] replays spikes at scheduled times.

use neurostep_npu_neural::{delay_to_steps, ArrayId, ClockId, PathwayId};
use neurostep_npu_runtime::StorageManager;
use tracing::trace;

use crate::clock::Clock;
use crate::error::{ConfigurationError, EngineError, Result};
use crate::synaptic_pathway::SynapticPathway;

/// Everything operations read and mutate during a run
#[derive(Default)]
pub struct RuntimeState {
    pub(crate) storage: StorageManager,
    pub(crate) clocks: Vec<Clock>,
    pub(crate) pathways: Vec<SynapticPathway>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageManager {
        &mut self.storage
    }

    /// Clocks are read-only to operations; only the scheduler advances them
    pub fn clock(&self, id: ClockId) -> Result<&Clock> {
        self.clocks
            .get(id.index())
            .ok_or_else(|| ConfigurationError::UnknownClock(id).into())
    }

    pub fn clocks(&self) -> &[Clock] {
        &self.clocks
    }

    pub fn pathway(&self, id: PathwayId) -> Result<&SynapticPathway> {
        self.pathways
            .get(id.index())
            .ok_or_else(|| ConfigurationError::UnknownPathway(id).into())
    }

    pub fn pathway_mut(&mut self, id: PathwayId) -> Result<&mut SynapticPathway> {
        self.pathways
            .get_mut(id.index())
            .ok_or_else(|| ConfigurationError::UnknownPathway(id).into())
    }

    pub fn pathways(&self) -> &[SynapticPathway] {
        &self.pathways
    }

    /// Storage and one pathway, borrowed together
    pub fn storage_and_pathway_mut(
        &mut self,
        id: PathwayId,
    ) -> Result<(&mut StorageManager, &mut SynapticPathway)> {
        let pathway = self
            .pathways
            .get_mut(id.index())
            .ok_or(ConfigurationError::UnknownPathway(id))?;
        Ok((&mut self.storage, pathway))
    }
}

/// Where in simulated time an operation is running
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    pub clock: ClockId,
    pub tick: u64,
    /// Clock time in seconds
    pub time: f64,
    /// Clock step in seconds
    pub dt: f64,
}

/// A per-step routine bound to a clock
pub trait Operation: Send {
    fn execute(&mut self, state: &mut RuntimeState, tick: &TickInfo) -> Result<()>;

    /// Pathway whose delay queue this operation advances
    ///
    /// The scheduler requires the bound clock to step at the pathway's `dt`.
    fn delivers(&self) -> Option<PathwayId> {
        None
    }
}

impl<F> Operation for F
where
    F: FnMut(&mut RuntimeState, &TickInfo) -> Result<()> + Send,
{
    fn execute(&mut self, state: &mut RuntimeState, tick: &TickInfo) -> Result<()> {
        self(state, tick)
    }
}

/// The per-synapse effect of a delivered spike
pub trait SynapticEffect: Send {
    /// Apply the effect for exactly the given synapses
    fn apply(&mut self, synapses: &[u32], storage: &mut StorageManager) -> Result<()>;
}

impl<F> SynapticEffect for F
where
    F: FnMut(&[u32], &mut StorageManager) -> Result<()> + Send,
{
    fn apply(&mut self, synapses: &[u32], storage: &mut StorageManager) -> Result<()> {
        self(synapses, storage)
    }
}

/// Push this tick's spikes into a pathway's queue
///
/// Reads a spikespace: an `i32` fixed array of length `N + 1` whose last
/// element is the number of valid leading spike indices.
pub struct PushSpikes {
    pathway: PathwayId,
    spikespace: ArrayId,
}

impl PushSpikes {
    pub fn new(pathway: PathwayId, spikespace: ArrayId) -> Self {
        Self { pathway, spikespace }
    }
}

/// Valid leading entries of a spikespace array
pub fn spikes_in<'a>(storage: &'a StorageManager, spikespace: ArrayId) -> Result<&'a [i32]> {
    let values = storage.fixed::<i32>(spikespace)?;
    let capacity = values.len().saturating_sub(1);
    let count = values.last().copied().unwrap_or(0) as i64;
    if count < 0 || count as usize > capacity {
        return Err(EngineError::InvalidSpikespace {
            name: storage.name(spikespace)?.to_string(),
            count,
            capacity,
        });
    }
    Ok(&values[..count as usize])
}

impl Operation for PushSpikes {
    fn execute(&mut self, state: &mut RuntimeState, tick: &TickInfo) -> Result<()> {
        let RuntimeState {
            storage, pathways, ..
        } = state;
        let pathway = pathways
            .get_mut(self.pathway.index())
            .ok_or(ConfigurationError::UnknownPathway(self.pathway))?;
        let spikes = spikes_in(storage, self.spikespace)?;
        let pushed = pathway.push_spikes(spikes)?;
        if pushed > 0 {
            trace!(
                "Tick {}: pathway '{}' queued {} synapses from {} spikes",
                tick.tick,
                pathway.name(),
                pushed,
                spikes.len()
            );
        }
        Ok(())
    }
}

/// Write the spikes scheduled for this tick into a spikespace
///
/// `indices` (`i32`) and `times` (`f64`, seconds) hold one entry per spike.
/// A spike fires on tick `round(time / dt)`. The spikespace is cleared on
/// every tick.
pub struct SpikeGenerator {
    spikespace: ArrayId,
    indices: ArrayId,
    times: ArrayId,
}

impl SpikeGenerator {
    pub fn new(spikespace: ArrayId, indices: ArrayId, times: ArrayId) -> Self {
        Self {
            spikespace,
            indices,
            times,
        }
    }
}

impl Operation for SpikeGenerator {
    fn execute(&mut self, state: &mut RuntimeState, tick: &TickInfo) -> Result<()> {
        let storage = state.storage_mut();
        let fired: Vec<i32> = {
            let indices = storage.slice::<i32>(self.indices)?;
            let times = storage.slice::<f64>(self.times)?;
            if indices.len() != times.len() {
                return Err(EngineError::Operation(format!(
                    "{} spike indices for {} spike times",
                    indices.len(),
                    times.len()
                )));
            }
            indices
                .iter()
                .zip(times)
                .filter(|(_, &time)| delay_to_steps(time, tick.dt) == Some(tick.tick))
                .map(|(&index, _)| index)
                .collect()
        };

        let name = storage.name(self.spikespace)?.to_string();
        let space = storage.fixed_mut::<i32>(self.spikespace)?;
        let capacity = space.len().saturating_sub(1);
        if fired.len() > capacity {
            return Err(EngineError::InvalidSpikespace {
                name,
                count: fired.len() as i64,
                capacity,
            });
        }
        if let Some(&index) = fired.iter().find(|&&i| i < 0 || i as usize >= capacity) {
            return Err(EngineError::Operation(format!(
                "spike index {} outside '{}' of {} units",
                index, name, capacity
            )));
        }
        space.fill(0);
        space[..fired.len()].copy_from_slice(&fired);
        space[capacity] = fired.len() as i32;
        Ok(())
    }
}

/// Apply due events of a pathway, then advance its queue
pub struct DeliverSpikes {
    pathway: PathwayId,
    effect: Box<dyn SynapticEffect>,
}

impl DeliverSpikes {
    pub fn new(pathway: PathwayId, effect: impl SynapticEffect + 'static) -> Self {
        Self {
            pathway,
            effect: Box::new(effect),
        }
    }
}

impl Operation for DeliverSpikes {
    fn execute(&mut self, state: &mut RuntimeState, tick: &TickInfo) -> Result<()> {
        let (storage, pathway) = state.storage_and_pathway_mut(self.pathway)?;
        let due = pathway.peek_due()?;
        if !due.is_empty() {
            trace!(
                "Tick {}: pathway '{}' delivering {} synapses",
                tick.tick,
                pathway.name(),
                due.len()
            );
            self.effect.apply(due, storage)?;
        }
        pathway.advance()
    }

    fn delivers(&self) -> Option<PathwayId> {
        Some(self.pathway)
    }
}

/// Weight added to the target variable per delivered synapse
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Constant(f64),
    /// `f64` per-synapse weights
    PerSynapse(ArrayId),
}

/// `target[post[syn]] += weight` for every delivered synapse
pub struct Accumulate {
    post: ArrayId,
    weight: Weight,
    target: ArrayId,
}

impl Accumulate {
    /// `post`: `i32` per-synapse target index; `target`: `f64` target variable
    pub fn new(post: ArrayId, weight: Weight, target: ArrayId) -> Self {
        Self { post, weight, target }
    }
}

impl SynapticEffect for Accumulate {
    fn apply(&mut self, synapses: &[u32], storage: &mut StorageManager) -> Result<()> {
        let updates = {
            let post = storage.slice::<i32>(self.post)?;
            let weights = match self.weight {
                Weight::PerSynapse(id) => Some(storage.slice::<f64>(id)?),
                Weight::Constant(_) => None,
            };
            let mut updates = Vec::with_capacity(synapses.len());
            for &syn in synapses {
                let syn = syn as usize;
                let w = match (self.weight, weights) {
                    (Weight::Constant(w), _) => Some(w),
                    (_, Some(ws)) => ws.get(syn).copied(),
                    (_, None) => None,
                };
                match (post.get(syn), w) {
                    (Some(&index), Some(w)) if index >= 0 => updates.push((index as usize, w)),
                    _ => {
                        return Err(EngineError::Operation(format!(
                            "synapse {} has no valid target or weight",
                            syn
                        )))
                    }
                }
            }
            updates
        };

        let target = storage.slice_mut::<f64>(self.target)?;
        for (index, w) in updates {
            let slot = target.get_mut(index).ok_or_else(|| {
                EngineError::Operation(format!("target index {} out of range", index))
            })?;
            *slot += w;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurostep_npu_neural::DType;
    use neurostep_npu_runtime::InitPolicy;

    #[test]
    fn test_spikes_in_reads_count_from_last_element() {
        let mut storage = StorageManager::new();
        let space = storage
            .declare_fixed("_array_neurongroup__spikespace", DType::I32, 5, InitPolicy::Zeros)
            .unwrap();
        storage.allocate().unwrap();

        assert!(spikes_in(&storage, space).unwrap().is_empty());
        storage.fill_from_slice(space, &[3, 1, 0, 0, 2]).unwrap();
        assert_eq!(spikes_in(&storage, space).unwrap(), &[3, 1]);

        storage.fill_from_slice(space, &[0, 0, 0, 0, 9]).unwrap();
        assert!(matches!(
            spikes_in(&storage, space),
            Err(EngineError::InvalidSpikespace { count: 9, capacity: 4, .. })
        ));
    }

    #[test]
    fn test_accumulate_constant_and_per_synapse() {
        let mut storage = StorageManager::new();
        let post = storage.declare_dynamic("post", DType::I32, 0).unwrap();
        let w = storage.declare_dynamic("w", DType::F64, 0).unwrap();
        let v = storage.declare_fixed("v", DType::F64, 3, InitPolicy::Zeros).unwrap();
        storage.allocate().unwrap();
        storage.fill_from_slice(post, &[2, 0, 2]).unwrap();
        storage.fill_from_slice(w, &[0.5, 1.0, 0.25]).unwrap();

        Accumulate::new(post, Weight::Constant(1.0), v)
            .apply(&[0, 1], &mut storage)
            .unwrap();
        assert_eq!(storage.fixed::<f64>(v).unwrap(), &[1.0, 0.0, 1.0]);

        Accumulate::new(post, Weight::PerSynapse(w), v)
            .apply(&[0, 2], &mut storage)
            .unwrap();
        assert_eq!(storage.fixed::<f64>(v).unwrap(), &[1.0, 0.0, 1.75]);
    }

    #[test]
    fn test_spike_generator_fires_on_rounded_tick() {
        let mut state = RuntimeState::new();
        let storage = state.storage_mut();
        let space = storage.declare_fixed("space", DType::I32, 4, InitPolicy::Zeros).unwrap();
        let indices = storage.declare_dynamic("indices", DType::I32, 0).unwrap();
        let times = storage.declare_dynamic("times", DType::F64, 0).unwrap();
        storage.allocate().unwrap();
        storage.fill_from_slice(indices, &[2, 0, 1]).unwrap();
        storage.fill_from_slice(times, &[0.1e-3, 0.1e-3, 0.29e-3]).unwrap();

        let mut generator = SpikeGenerator::new(space, indices, times);
        let mut fired = Vec::new();
        for tick in 0..4u64 {
            let info = TickInfo {
                clock: ClockId(0),
                tick,
                time: tick as f64 * 0.1e-3,
                dt: 0.1e-3,
            };
            generator.execute(&mut state, &info).unwrap();
            fired.push(spikes_in(state.storage(), space).unwrap().to_vec());
        }
        assert_eq!(fired, vec![vec![], vec![2, 0], vec![], vec![1]]);

        state.storage_mut().fill_from_slice(indices, &[5]).unwrap();
        state.storage_mut().fill_from_slice(times, &[0.0]).unwrap();
        let info = TickInfo {
            clock: ClockId(0),
            tick: 0,
            time: 0.0,
            dt: 0.1e-3,
        };
        assert!(matches!(
            generator.execute(&mut state, &info),
            Err(EngineError::Operation(_))
        ));
    }

    #[test]
    fn test_closure_operation() {
        let mut state = RuntimeState::new();
        let mut calls = 0u32;
        {
            let mut op = |_: &mut RuntimeState, info: &TickInfo| -> Result<()> {
                calls += info.tick as u32;
                Ok(())
            };
            let info = TickInfo {
                clock: ClockId(0),
                tick: 4,
                time: 0.4,
                dt: 0.1,
            };
            op.execute(&mut state, &info).unwrap();
        }
        assert_eq!(calls, 4);
        assert!(state.clock(ClockId(0)).is_err());
        assert!(state.pathway(PathwayId(0)).is_err());
    }
}
