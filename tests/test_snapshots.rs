// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static array loading, result persistence and run determinism.

use std::fs;
use std::path::Path;

use neurostep::prelude::*;

fn settings(dir: &Path) -> SimulationSettings {
    SimulationSettings {
        static_dir: dir.join("static_arrays"),
        results_dir: dir.join("results"),
        ..SimulationSettings::default()
    }
}

/// `rate` is loaded from a static snapshot; each tick adds it to `v` and
/// appends the tick index to a dynamic `t` array
fn integrator(dir: &Path) -> (Simulation, NetworkId) {
    let mut sim = Simulation::new(TimeGrid::default(), settings(dir));
    let clock = sim.add_clock("defaultclock", 0.1e-3).unwrap();
    let storage = sim.storage_mut();
    let rate = storage
        .declare_static("_static_array__array_neurons_rate", DType::F64, 3)
        .unwrap();
    let v = storage
        .declare_fixed(array_name("neurons", "v"), DType::F64, 3, InitPolicy::Zeros)
        .unwrap();
    storage
        .declare_fixed(array_name("neurons", "i"), DType::I32, 3, InitPolicy::Arange { start: 0 })
        .unwrap();
    let t = storage
        .declare_dynamic(dynamic_array_name("spikemonitor", "t"), DType::I64, 0)
        .unwrap();

    let net = sim.default_network();
    sim.add_clock_to_network(net, clock).unwrap();
    sim.add_operation(net, clock, "stateupdater", move |state: &mut RuntimeState, info: &TickInfo| -> EngineResult<()> {
        let storage = state.storage_mut();
        let (rates, values) = storage.slice_pair_mut::<f64, f64>(rate, v)?;
        for (x, r) in values.iter_mut().zip(rates) {
            *x += r;
        }
        storage.dynamic_mut::<i64>(t)?.push(info.tick as i64);
        Ok(())
    })
    .unwrap();
    (sim, net)
}

fn write_static(dir: &Path, name: &str, values: &[f64]) {
    let static_dir = dir.join("static_arrays");
    fs::create_dir_all(&static_dir).unwrap();
    fs::write(static_dir.join(name), bytemuck::cast_slice::<f64, u8>(values)).unwrap();
}

#[test]
fn static_arrays_drive_the_run_and_results_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), "_static_array__array_neurons_rate", &[1.0, 0.5, -2.0]);
    let (mut sim, net) = integrator(dir.path());

    let summary = sim.execute(net, 0.4e-3).expect("execute");
    assert_eq!(summary.steps, 4);

    let results = dir.path().join("results");
    let v: Vec<f64> = bytemuck::pod_collect_to_vec(&fs::read(results.join("_array_neurons_v")).unwrap());
    assert_eq!(v, vec![4.0, 2.0, -8.0]);
    let i: Vec<i32> = bytemuck::pod_collect_to_vec(&fs::read(results.join("_array_neurons_i")).unwrap());
    assert_eq!(i, vec![0, 1, 2]);
    let t: Vec<i64> =
        bytemuck::pod_collect_to_vec(&fs::read(results.join("_dynamic_array_spikemonitor_t")).unwrap());
    assert_eq!(t, vec![0, 1, 2, 3]);

    assert!(!results.join("_static_array__array_neurons_rate").exists());
}

#[test]
fn missing_static_array_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sim, net) = integrator(dir.path());
    sim.allocate().unwrap();

    let report = sim.load_static_arrays().unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(
        report.failed[0].array_name(),
        Some("_static_array__array_neurons_rate")
    );

    // Zero rates: the run proceeds with the initial contents
    sim.run(net, 0.2e-3).unwrap();
    let v = sim.storage().id("_array_neurons_v").unwrap();
    assert_eq!(sim.storage().fixed::<f64>(v).unwrap(), &[0.0, 0.0, 0.0]);
    sim.release();
}

#[test]
fn short_static_snapshot_leaves_array_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), "_static_array__array_neurons_rate", &[1.0]);
    let (mut sim, _) = integrator(dir.path());
    sim.allocate().unwrap();

    let report = sim.load_static_arrays().unwrap();
    assert!(matches!(
        report.failed.as_slice(),
        [StorageError::ShortSnapshot { expected: 24, actual: 8, .. }]
    ));
    let rate = sim.storage().id("_static_array__array_neurons_rate").unwrap();
    assert_eq!(sim.storage().fixed::<f64>(rate).unwrap(), &[0.0, 0.0, 0.0]);
}

#[test]
fn persisted_results_load_back_into_a_fresh_simulation() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), "_static_array__array_neurons_rate", &[0.25, 0.5, 0.75]);
    let (mut first, net) = integrator(dir.path());
    first.execute(net, 0.3e-3).unwrap();

    let (mut second, _) = integrator(dir.path());
    second.allocate().unwrap();
    let results = dir.path().join("results");
    second.storage_mut().load_by_name("_array_neurons_v", &results).unwrap();
    let v = second.storage().id("_array_neurons_v").unwrap();
    assert_eq!(second.storage().fixed::<f64>(v).unwrap(), &[0.75, 1.5, 2.25]);
}

#[test]
fn identical_runs_produce_identical_results() {
    let run = |dir: &Path| {
        write_static(dir, "_static_array__array_neurons_rate", &[0.1, 0.2, 0.3]);
        let (mut sim, net) = integrator(dir);
        let summary = sim.execute(net, 1e-3).unwrap();
        let results = dir.join("results");
        let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(&results)
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                (
                    entry.file_name().to_string_lossy().into_owned(),
                    fs::read(entry.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        (summary.steps, summary.operations_executed, files)
    };

    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let first = run(a.path());
    let second = run(b.path());
    assert_eq!(first.0, 10);
    assert_eq!(first, second);
}

#[test]
fn simulation_from_config_uses_snapshot_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = neurostep::config::NeurostepConfig::default();
    config.snapshot.static_dir = dir.path().join("in");
    config.snapshot.results_dir = dir.path().join("out");
    config.queue.default_max_delay = Some(2e-3);

    let sim = Simulation::from_config(&config).unwrap();
    assert_eq!(sim.settings().static_dir, dir.path().join("in"));
    assert_eq!(sim.settings().results_dir, dir.path().join("out"));
    assert_eq!(sim.settings().default_max_delay, Some(2e-3));
    assert_eq!(sim.grid().quantum(), TimeGrid::DEFAULT_QUANTUM);
}
