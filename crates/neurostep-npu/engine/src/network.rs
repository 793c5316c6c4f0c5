// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network Scheduler
//!
//! A network drives a set of clocks and an ordered list of (clock, operation)
//! bindings. `run(duration)` repeatedly:
//! 1. finds the earliest tick time among clocks that still have ticks left,
//! 2. runs every binding whose clock ticks at that time, in declaration order,
//! 3. advances each of those clocks by one tick,
//!
//! until every clock has reached its end tick. A clock's end tick is the first
//! tick at or after the network's end time, so runs are additive even for
//! clocks whose step does not divide the duration. All comparisons are on integer
//! grid times and all iteration is over `Vec`s, so two runs with the same
//! inputs execute the same operations in the same order.
//!
//! A delivery operation must be bound to a clock that steps at its pathway's
//! `dt`; queue delays are counted in those steps.
//!
//! ## State Machine
//! `Idle → Running → Idle`. Clock ticks are preserved between runs, so
//! `run(a)` followed by `run(b)` ends where `run(a + b)` would.

use std::time::{Duration, Instant};

use neurostep_npu_neural::{ClockId, PathwayId, TimeGrid};
use tracing::{debug, info, trace};

use crate::error::{ConfigurationError, EngineError, Result};
use crate::operation::{Operation, RuntimeState, TickInfo};

/// Scheduler state of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Idle,
    Running,
}

struct Binding {
    clock: ClockId,
    name: String,
    operation: Box<dyn Operation>,
}

/// What one `run()` call did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub network: String,
    /// Network time before and after the run, in seconds
    pub start_time: f64,
    pub end_time: f64,
    /// Distinct global times at which something ticked
    pub steps: u64,
    /// Ticks executed per clock, in registration order
    pub clock_ticks: Vec<(ClockId, u64)>,
    pub operations_executed: u64,
    /// Wall-clock duration; informational only
    pub elapsed: Duration,
}

pub struct Network {
    name: String,
    clocks: Vec<ClockId>,
    bindings: Vec<Binding>,
    state: NetworkState,
    /// Network time in grid quanta
    t_quanta: u64,
    /// Reused per step: which clocks are due
    due: Vec<bool>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clocks: Vec::new(),
            bindings: Vec::new(),
            state: NetworkState::Idle,
            t_quanta: 0,
            due: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Clocks this network drives, in registration order
    pub fn clocks(&self) -> &[ClockId] {
        &self.clocks
    }

    /// Binding names in declaration order
    pub fn operation_names(&self) -> impl Iterator<Item = (&str, ClockId)> {
        self.bindings.iter().map(|b| (b.name.as_str(), b.clock))
    }

    /// Network time in grid quanta
    pub fn t_quanta(&self) -> u64 {
        self.t_quanta
    }

    /// Drive `clock` from this network; registering twice is a no-op
    pub fn add_clock(&mut self, clock: ClockId) {
        if !self.clocks.contains(&clock) {
            self.clocks.push(clock);
        }
    }

    /// Bind an operation to a clock this network drives
    ///
    /// Operations sharing a tick run in the order they were added here,
    /// regardless of which clock they are bound to.
    pub fn add_operation(
        &mut self,
        clock: ClockId,
        name: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> std::result::Result<(), ConfigurationError> {
        let name = name.into();
        if !self.clocks.contains(&clock) {
            return Err(ConfigurationError::UnboundOperation {
                network: self.name.clone(),
                operation: name,
                clock,
            });
        }
        if self.bindings.iter().any(|b| b.name == name) {
            return Err(ConfigurationError::DuplicateName {
                kind: "operation",
                name,
            });
        }
        self.bindings.push(Binding {
            clock,
            name,
            operation: Box::new(operation),
        });
        Ok(())
    }

    /// Advance simulated time by `duration` seconds
    ///
    /// # Errors
    ///
    /// Configuration errors (unknown clock, invalid duration) are returned
    /// before any tick runs. An operation error stops the run; the network
    /// returns to `Idle` with clocks at the failing tick.
    pub fn run(&mut self, state: &mut RuntimeState, grid: &TimeGrid, duration: f64) -> Result<RunSummary> {
        if self.state == NetworkState::Running {
            return Err(EngineError::AlreadyRunning(self.name.clone()));
        }
        let duration_quanta = grid
            .duration_to_quanta(duration)
            .map_err(ConfigurationError::InvalidDuration)?;
        for &clock in &self.clocks {
            if clock.index() >= state.clocks.len() {
                return Err(ConfigurationError::UnknownClock(clock).into());
            }
        }
        for binding in &self.bindings {
            if let Some(pathway) = binding.operation.delivers() {
                check_delivery_clock(state, grid, binding.clock, pathway)?;
            }
        }

        let start_quanta = self.t_quanta;
        let start_ticks: Vec<u64> = self
            .clocks
            .iter()
            .map(|c| state.clocks[c.index()].tick_index())
            .collect();
        let end_quanta = start_quanta.saturating_add(duration_quanta);
        for &clock in &self.clocks {
            state.clocks[clock.index()].set_end_at(end_quanta);
        }

        info!(
            "Running network '{}' for {} s ({} clocks, {} operations)",
            self.name,
            grid.to_seconds(duration_quanta),
            self.clocks.len(),
            self.bindings.len()
        );

        self.state = NetworkState::Running;
        let started = Instant::now();
        let outcome = self.run_loop(state);
        self.state = NetworkState::Idle;
        let (steps, operations_executed) = outcome?;

        self.t_quanta = end_quanta;
        let clock_ticks = self
            .clocks
            .iter()
            .zip(start_ticks)
            .map(|(c, start)| (*c, state.clocks[c.index()].tick_index() - start))
            .collect();

        let summary = RunSummary {
            network: self.name.clone(),
            start_time: grid.to_seconds(start_quanta),
            end_time: grid.to_seconds(self.t_quanta),
            steps,
            clock_ticks,
            operations_executed,
            elapsed: started.elapsed(),
        };
        info!(
            "Network '{}' finished: {} steps, {} operations in {:.3} ms",
            self.name,
            summary.steps,
            summary.operations_executed,
            summary.elapsed.as_secs_f64() * 1000.0
        );
        Ok(summary)
    }

    fn next_time(&self, state: &RuntimeState) -> Option<u64> {
        self.clocks
            .iter()
            .map(|c| &state.clocks[c.index()])
            .filter(|clock| clock.is_active())
            .map(|clock| clock.tick_time())
            .min()
    }

    fn run_loop(&mut self, state: &mut RuntimeState) -> Result<(u64, u64)> {
        let mut steps = 0u64;
        let mut executed = 0u64;
        self.due.clear();
        self.due.resize(state.clocks.len(), false);

        while let Some(now) = self.next_time(state) {
            for &clock in &self.clocks {
                let c = &state.clocks[clock.index()];
                self.due[clock.index()] = c.is_active() && c.is_due(now);
            }
            trace!("Network '{}' step at t={} quanta", self.name, now);

            for binding in &mut self.bindings {
                if !self.due[binding.clock.index()] {
                    continue;
                }
                let clock = &state.clocks[binding.clock.index()];
                let info = TickInfo {
                    clock: binding.clock,
                    tick: clock.tick_index(),
                    time: clock.time(),
                    dt: clock.dt(),
                };
                binding
                    .operation
                    .execute(state, &info)
                    .map_err(|source| EngineError::OperationFailed {
                        operation: binding.name.clone(),
                        clock: binding.clock,
                        tick: info.tick,
                        source: Box::new(source),
                    })?;
                executed += 1;
            }

            for &clock in &self.clocks {
                if self.due[clock.index()] {
                    state.clocks[clock.index()].advance();
                }
            }
            steps += 1;
        }

        debug!("Network '{}' ran {} steps", self.name, steps);
        Ok((steps, executed))
    }
}

/// A pathway's queue may only be advanced by a clock stepping at its `dt`
pub(crate) fn check_delivery_clock(
    state: &RuntimeState,
    grid: &TimeGrid,
    clock: ClockId,
    pathway: PathwayId,
) -> std::result::Result<(), ConfigurationError> {
    let clock = state
        .clocks
        .get(clock.index())
        .ok_or(ConfigurationError::UnknownClock(clock))?;
    let pathway = state
        .pathways
        .get(pathway.index())
        .ok_or(ConfigurationError::UnknownPathway(pathway))?;
    match grid.step_to_quanta(pathway.dt()) {
        Ok(step) if step == clock.dt_quanta() => Ok(()),
        _ => Err(ConfigurationError::PathwayClockMismatch {
            pathway: pathway.name().to_string(),
            pathway_dt: pathway.dt(),
            clock: clock.name().to_string(),
            clock_dt: clock.dt(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(String, u64)>>>;

    fn state_with_clocks(steps: &[f64], grid: &TimeGrid) -> RuntimeState {
        let mut state = RuntimeState::new();
        for (i, &dt) in steps.iter().enumerate() {
            state.clocks.push(Clock::new(format!("clock_{}", i), dt, grid).unwrap());
        }
        state
    }

    fn recorder(log: &Log, label: &str) -> impl Operation + 'static {
        let log = Arc::clone(log);
        let label = label.to_string();
        move |_: &mut RuntimeState, info: &TickInfo| -> Result<()> {
            log.lock().unwrap().push((label.clone(), info.tick));
            Ok(())
        }
    }

    #[test]
    fn test_run_advances_ticks_exactly() {
        let grid = TimeGrid::default();
        let mut state = state_with_clocks(&[0.1e-3], &grid);
        let mut net = Network::new("net");
        net.add_clock(ClockId(0));

        let summary = net.run(&mut state, &grid, 1e-3).unwrap();
        assert_eq!(state.clocks[0].tick_index(), 10);
        assert_eq!(summary.clock_ticks, vec![(ClockId(0), 10)]);
        assert_eq!(summary.steps, 10);
        assert_eq!(net.state(), NetworkState::Idle);
    }

    #[test]
    fn test_runs_are_additive() {
        let grid = TimeGrid::default();
        let mut split = state_with_clocks(&[0.1e-3, 0.3e-3], &grid);
        let mut whole = state_with_clocks(&[0.1e-3, 0.3e-3], &grid);
        let mut net_split = Network::new("split");
        let mut net_whole = Network::new("whole");
        for net in [&mut net_split, &mut net_whole] {
            net.add_clock(ClockId(0));
            net.add_clock(ClockId(1));
        }

        net_split.run(&mut split, &grid, 0.7e-3).unwrap();
        net_split.run(&mut split, &grid, 0.5e-3).unwrap();
        net_whole.run(&mut whole, &grid, 1.2e-3).unwrap();

        for i in 0..2 {
            assert_eq!(split.clocks[i].tick_index(), whole.clocks[i].tick_index());
        }
        assert_eq!(whole.clocks[0].tick_index(), 12);
        // 0.0, 0.3, 0.6 and 0.9 ms; 1.2 ms belongs to the next run
        assert_eq!(whole.clocks[1].tick_index(), 4);
        assert_eq!(net_split.t_quanta(), net_whole.t_quanta());
    }

    #[test]
    fn test_shared_tick_follows_declaration_order() {
        let grid = TimeGrid::new(1.0, 1e-6).unwrap();
        let mut state = state_with_clocks(&[1.0, 2.0], &grid);
        let log: Log = Arc::default();

        let mut net = Network::new("net");
        // Registration order: slow clock first
        net.add_clock(ClockId(1));
        net.add_clock(ClockId(0));
        net.add_operation(ClockId(0), "fast", recorder(&log, "fast")).unwrap();
        net.add_operation(ClockId(1), "slow", recorder(&log, "slow")).unwrap();

        net.run(&mut state, &grid, 3.0).unwrap();
        let entries: Vec<(String, u64)> = log.lock().unwrap().clone();
        let expected: Vec<(String, u64)> = vec![
            ("fast".into(), 0),
            ("slow".into(), 0),
            ("fast".into(), 1),
            ("fast".into(), 2),
            ("slow".into(), 1),
        ];
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_unbound_operation_is_rejected() {
        let log: Log = Arc::default();
        let mut net = Network::new("net");
        let err = net
            .add_operation(ClockId(3), "orphan", recorder(&log, "orphan"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnboundOperation { .. }));

        net.add_clock(ClockId(0));
        net.add_operation(ClockId(0), "op", recorder(&log, "op")).unwrap();
        assert!(matches!(
            net.add_operation(ClockId(0), "op", recorder(&log, "op")),
            Err(ConfigurationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_unknown_clock_fails_before_any_tick() {
        let grid = TimeGrid::default();
        let mut state = state_with_clocks(&[1e-3], &grid);
        let log: Log = Arc::default();
        let mut net = Network::new("net");
        net.add_clock(ClockId(0));
        net.add_clock(ClockId(5));
        net.add_operation(ClockId(0), "op", recorder(&log, "op")).unwrap();

        let err = net.run(&mut state, &grid, 1e-3).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(log.lock().unwrap().is_empty());
        assert!(net.run(&mut state, &grid, -1.0).unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_operation_error_stops_run() {
        let grid = TimeGrid::default();
        let mut state = state_with_clocks(&[1e-3], &grid);
        let mut net = Network::new("net");
        net.add_clock(ClockId(0));
        net.add_operation(ClockId(0), "fails_at_2", |_: &mut RuntimeState, info: &TickInfo| -> Result<()> {
            if info.tick == 2 {
                Err(EngineError::Operation("boom".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap();

        let err = net.run(&mut state, &grid, 5e-3).unwrap_err();
        assert!(matches!(err, EngineError::OperationFailed { tick: 2, .. }));
        assert_eq!(net.state(), NetworkState::Idle);
        assert_eq!(state.clocks[0].tick_index(), 2);
    }

    #[test]
    fn test_delivery_on_a_clock_of_another_step_fails_before_any_tick() {
        use crate::operation::DeliverSpikes;
        use crate::synaptic_pathway::{PathwayConfig, SynapticPathway};
        use neurostep_npu_neural::ArrayId;
        use neurostep_npu_runtime::StorageManager;

        let grid = TimeGrid::default();
        let mut state = state_with_clocks(&[0.2e-3, 0.1e-3], &grid);
        let config = PathwayConfig::new("syn", 1, 1, ArrayId(0), ArrayId(1), 0.1e-3);
        state.pathways.push(SynapticPathway::new(config).unwrap());
        let log: Log = Arc::default();

        let mut net = Network::new("net");
        net.add_clock(ClockId(0));
        net.add_operation(ClockId(0), "op", recorder(&log, "op")).unwrap();
        let noop = |_: &[u32], _: &mut StorageManager| -> Result<()> { Ok(()) };
        net.add_operation(ClockId(0), "syn_pre", DeliverSpikes::new(PathwayId(0), noop))
            .unwrap();

        let err = net.run(&mut state, &grid, 1e-3).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigurationError::PathwayClockMismatch { .. })
        ));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(state.clocks[0].tick_index(), 0);

        assert!(check_delivery_clock(&state, &grid, ClockId(1), PathwayId(0)).is_ok());
    }

    #[test]
    fn test_zero_duration_runs_nothing() {
        let grid = TimeGrid::default();
        let mut state = state_with_clocks(&[1e-3], &grid);
        let mut net = Network::new("net");
        net.add_clock(ClockId(0));
        let summary = net.run(&mut state, &grid, 0.0).unwrap();
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.operations_executed, 0);
    }
}
