// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Standalone Simulation Runner

Runs one simulation the way a generated `main` does: allocate, load static
arrays, run the default network, persist results, release.

Usage:
  cargo run --bin standalone_main -- [--config <neurostep.toml>] [--model <model.json>]
      [--duration <seconds>] [--set <key>=<value>]... [--debug-all | --debug-<crate>]

Without `--model` a built-in ring network is simulated: one unit spikes per
tick and every unit excites its neighbour after a unit-dependent delay.

With `--model`, synapses and input spikes come from the static directory:
declare the synapse arrays as `"external": true` dynamic arrays and drive the
source spikespace with a `spike_generator` operation. Their lengths are taken
from the snapshot files.

`--set` keys: log_level, static_dir, results_dir, time_quantum, debug
(`debug=true` acts like `--debug-all`)
*/

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use neurostep::config::{load_config, validate_config, NeurostepConfig};
use neurostep::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use neurostep::prelude::*;
use tracing::{info, warn};

const RING_SIZE: usize = 10;

struct Args {
    config: Option<PathBuf>,
    model: Option<PathBuf>,
    duration: f64,
    overrides: HashMap<String, String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        model: None,
        duration: 0.1,
        overrides: HashMap::new(),
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().context("--config needs a path")?.into()),
            "--model" => args.model = Some(iter.next().context("--model needs a path")?.into()),
            "--duration" => {
                let value = iter.next().context("--duration needs seconds")?;
                args.duration = value
                    .parse()
                    .with_context(|| format!("invalid duration '{}'", value))?;
            }
            "--set" => {
                let pair = iter.next().context("--set needs key=value")?;
                let Some((key, value)) = pair.split_once('=') else {
                    bail!("--set expects key=value, got '{}'", pair);
                };
                args.overrides.insert(key.to_string(), value.to_string());
            }
            "--help" | "-h" => {
                println!("{}", debug_flags_help());
                std::process::exit(0);
            }
            other if other.starts_with("--debug") => {}
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(args)
}

/// Config file if one is given or found, defaults otherwise
fn resolve_config(args: &Args) -> Result<NeurostepConfig> {
    let config = match load_config(args.config.as_deref(), Some(&args.overrides)) {
        Ok(config) => config,
        Err(err) if args.config.is_none() => {
            eprintln!("No configuration file ({}); using defaults", err);
            let mut config = NeurostepConfig::default();
            neurostep::config::apply_environment_overrides(&mut config);
            neurostep::config::apply_cli_overrides(&mut config, &args.overrides);
            config
        }
        Err(err) => return Err(err).context("failed to load configuration"),
    };
    validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

/// Ring of `RING_SIZE` units; unit `i` spikes on ticks where `tick % RING_SIZE == i`
/// and excites unit `i + 1` after `(i % 3) + 1` steps
fn build_ring(sim: &mut Simulation) -> Result<(NetworkId, [ArrayId; 4])> {
    let dt = 0.1e-3;
    let clock = sim.add_clock("defaultclock", dt)?;
    let storage = sim.storage_mut();
    let space = storage.declare_fixed(
        array_name("neurongroup", "_spikespace"),
        DType::I32,
        RING_SIZE + 1,
        InitPolicy::Zeros,
    )?;
    let v = storage.declare_fixed(array_name("neurongroup", "v"), DType::F64, RING_SIZE, InitPolicy::Zeros)?;
    storage.declare_fixed(
        array_name("neurongroup", "i"),
        DType::I32,
        RING_SIZE,
        InitPolicy::Arange { start: 0 },
    )?;
    let delay = storage.declare_dynamic(dynamic_array_name("synapses", "delay"), DType::F64, 0)?;
    let pre = storage.declare_dynamic(dynamic_array_name("synapses", "_synaptic_pre"), DType::I32, 0)?;
    let post = storage.declare_dynamic(dynamic_array_name("synapses", "_synaptic_post"), DType::I32, 0)?;
    let pathway = sim.add_pathway(
        PathwayConfig::new("synapses_pre", RING_SIZE, RING_SIZE, delay, pre, dt).with_targets(post),
    )?;

    let net = sim.default_network();
    sim.add_clock_to_network(net, clock)?;
    sim.add_operation(net, clock, "neurongroup_stateupdater", move |state: &mut RuntimeState, info: &TickInfo| -> EngineResult<()> {
        for x in state.storage_mut().fixed_mut::<f64>(v)? {
            *x *= (-info.dt / 10e-3).exp();
        }
        Ok(())
    })?;
    sim.add_operation(net, clock, "neurongroup_spike_thresholder", move |state: &mut RuntimeState, info: &TickInfo| -> EngineResult<()> {
        let slots = state.storage_mut().fixed_mut::<i32>(space)?;
        slots.fill(0);
        slots[0] = (info.tick % RING_SIZE as u64) as i32;
        slots[RING_SIZE] = 1;
        Ok(())
    })?;
    sim.add_operation(net, clock, "synapses_pre_push_spikes", PushSpikes::new(pathway, space))?;
    sim.add_delivery(
        net,
        clock,
        "synapses_pre",
        pathway,
        Accumulate::new(post, Weight::Constant(0.5), v),
    )?;
    Ok((net, [delay, pre, post, v]))
}

fn create_ring_synapses(sim: &mut Simulation, [delay, pre, post, _]: [ArrayId; 4]) -> Result<()> {
    let storage = sim.storage_mut();
    for i in 0..RING_SIZE {
        storage.dynamic_mut::<f64>(delay)?.push(((i % 3) + 1) as f64 * 0.1e-3);
        storage.dynamic_mut::<i32>(pre)?.push(i as i32);
        storage.dynamic_mut::<i32>(post)?.push(((i + 1) % RING_SIZE) as i32);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = resolve_config(&args)?;

    let debug_flags = parse_debug_flags().with_config_debug(config.system.debug);
    let options = LoggingOptions {
        level: config.system.log_level.clone(),
        file_logging: config.logging.file_logging,
        log_dir: config.logging.log_dir.clone(),
        ..LoggingOptions::default()
    };
    let _logging = init_logging(&debug_flags, &options)?;

    let mut sim = Simulation::from_config(&config)?;
    let summary = match &args.model {
        Some(path) => {
            let model = ModelDescription::from_path(path)?;
            model.build(&mut sim)?;
            sim.execute(sim.default_network(), args.duration)?
        }
        None => {
            let (net, arrays) = build_ring(&mut sim)?;
            sim.allocate()?;
            let loaded = sim.load_static_arrays()?;
            if !loaded.is_complete() {
                warn!("{} static arrays missing", loaded.failed.len());
            }
            create_ring_synapses(&mut sim, arrays)?;
            let summary = sim.run(net, args.duration);
            if summary.is_ok() {
                sim.persist()?;
                sim.debug_report();
            }
            sim.release();
            summary?
        }
    };

    info!(
        "Simulated {:.4} s of '{}' in {:.3} s ({} steps, {} operations)",
        summary.end_time - summary.start_time,
        summary.network,
        summary.elapsed.as_secs_f64(),
        summary.steps,
        summary.operations_executed
    );
    Ok(())
}
