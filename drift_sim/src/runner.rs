//! Scenario runner - executes drift property scenarios against seeded
//! coordinators.

use crate::scenarios::ScenarioId;

use drift_core::fracture::{corrupt_value, fracture};
use drift_core::registry::ResolutionContext;
use drift_core::{
    CombinationRegistry, DriftConfig, DriftCoordinator, Element, ElementalTable, JsonFileStore,
    OperationRecord, ResourceDelta, ResourceLedger, SnapshotStore,
    spawn_entropy_pulse,
};
use drift_env::{DriftContext, SimContext};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Lifecycle operations committed
    pub operations: u64,

    /// Entropy ticks applied (direct or by the pulse)
    pub ticks: u64,

    /// Anomaly echoes in the log at the end
    pub echoes: u64,

    /// Alchemy trials run
    pub trials: u64,

    /// Successful discoveries among the trials
    pub discoveries: u64,

    /// Records fractured
    pub fractured_records: u64,
}

type Outcome = Result<ScenarioMetrics, String>;

/// Fails the scenario with `reason` unless `condition` holds.
fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

/// Runs drift scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Lifecycle operations per scenario
    operations: usize,

    /// Alchemy trials for the discovery-rate scenario
    trials: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            operations: 500,
            trials: 10_000,
        }
    }

    /// Sets the lifecycle operation count.
    pub fn with_operations(mut self, operations: usize) -> Self {
        self.operations = operations.max(1);
        self
    }

    /// Sets the discovery trial count.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let outcome = match scenario {
            ScenarioId::FieldBounds => self.run_field_bounds(),
            ScenarioId::WipeAccounting => self.run_wipe_accounting(),
            ScenarioId::DiscoveryRate => self.run_discovery_rate(),
            ScenarioId::ContendedPulse => self.run_contended_pulse(),
            ScenarioId::ZeroLedgerCollapse => self.run_zero_ledger_collapse(),
            ScenarioId::SnapshotRoundtrip => self.run_snapshot_roundtrip(),
            ScenarioId::FractureShape => self.run_fracture_shape(),
        };

        match outcome {
            Ok(metrics) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                failure_reason: None,
                metrics,
            },
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                failure_reason: Some(reason),
                metrics: ScenarioMetrics::default(),
            },
        }
    }

    fn coordinator(&self) -> DriftCoordinator<SimContext> {
        DriftCoordinator::new(SimContext::shared(self.seed))
    }

    /// DRIFT-001: FieldBounds - every scalar stays in range after every call.
    fn run_field_bounds(&self) -> Outcome {
        let coord = self.coordinator();
        let mut picker = coord.context().entropy_source(100);
        let mut metrics = ScenarioMetrics::default();

        for step in 0..self.operations {
            match picker.gen_range(0..10) {
                0..=3 => {
                    coord.tick();
                    metrics.ticks += 1;
                }
                4..=5 => {
                    check_flux(&coord.fork(None))?;
                    metrics.operations += 1;
                }
                6..=7 => {
                    check_flux(&coord.collapse(None).map_err(|e| e.to_string())?)?;
                    metrics.operations += 1;
                }
                8 => {
                    check_flux(&coord.memory_wipe().map_err(|e| e.to_string())?)?;
                    metrics.operations += 1;
                }
                _ => {
                    coord.scan();
                }
            }

            if let Some(violation) = coord.field().bounds_violation() {
                return Err(format!("step {}: {}", step, violation));
            }
        }

        metrics.echoes = coord.echo_log().len() as u64;
        info!(
            "✓ FieldBounds complete: {} operations, {} ticks",
            metrics.operations, metrics.ticks
        );
        Ok(metrics)
    }

    /// DRIFT-002: WipeAccounting - empty log, +2N time-salt, flux at 0.5.
    fn run_wipe_accounting(&self) -> Outcome {
        let coord = self.coordinator();
        let mut picker = coord.context().entropy_source(101);
        let mut metrics = ScenarioMetrics::default();

        for round in 0..10 {
            let history = picker.gen_range(0..self.operations.min(40) + 1);
            for _ in 0..history {
                if picker.gen_bool(0.5) {
                    coord.fork(None);
                } else {
                    coord.collapse(None).map_err(|e| e.to_string())?;
                }
                if picker.gen_bool(0.3) {
                    coord.tick();
                    metrics.ticks += 1;
                }
            }

            let n = coord.operation_log().len();
            let salt_before = coord.ledger().time_salt;
            coord.memory_wipe().map_err(|e| e.to_string())?;
            metrics.operations += n as u64 + 1;

            ensure(coord.operation_log().is_empty(), || {
                format!("round {}: log not empty after wipe", round)
            })?;
            let salt_after = coord.ledger().time_salt;
            ensure(salt_after == salt_before + 2 * n as u64, || {
                format!(
                    "round {}: wiped {} but salt went {} -> {}",
                    round, n, salt_before, salt_after
                )
            })?;
            ensure(coord.field().global_flux == 0.5, || {
                format!("round {}: flux {} after wipe", round, coord.field().global_flux)
            })?;
        }

        metrics.echoes = coord.echo_log().len() as u64;
        info!("✓ WipeAccounting complete: {} operations", metrics.operations);
        Ok(metrics)
    }

    /// DRIFT-003: DiscoveryRate - observed rate within tolerance of 0.24.
    fn run_discovery_rate(&self) -> Outcome {
        let ctx = SimContext::new(self.seed);
        let mut rng = ctx.entropy_source(102);
        let table = ElementalTable::new()
            .with_affinity("A", Element::Void)
            .with_affinity("B", Element::Energy);

        let expected = 0.8_f64 * 0.3;
        let mut metrics = ScenarioMetrics::default();

        for _ in 0..self.trials {
            let mut registry = CombinationRegistry::empty(table.clone());
            let resolution = registry
                .resolve(&["A", "B"], ResolutionContext::default(), &mut rng)
                .map_err(|e| e.to_string())?;
            metrics.trials += 1;
            if resolution.is_discovery() {
                metrics.discoveries += 1;
            }
        }

        let rate = metrics.discoveries as f64 / metrics.trials as f64;
        // Five standard errors, floored at 0.02 for large trial counts
        let sigma = (expected * (1.0 - expected) / metrics.trials as f64).sqrt();
        let tolerance = (5.0 * sigma).max(0.02);
        debug!("discovery rate {:.4} (expected {:.2} +/- {:.4})", rate, expected, tolerance);

        ensure((rate - expected).abs() <= tolerance, || {
            format!(
                "discovery rate {:.4} outside {:.2} +/- {:.4}",
                rate, expected, tolerance
            )
        })?;

        info!(
            "✓ DiscoveryRate complete: {}/{} discoveries ({:.2}%)",
            metrics.discoveries,
            metrics.trials,
            rate * 100.0
        );
        Ok(metrics)
    }

    /// DRIFT-004: ContendedPulse - timer and threads share the section.
    fn run_contended_pulse(&self) -> Outcome {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| format!("runtime: {}", e))?;

        let ctx = SimContext::shared(self.seed);
        let coord = Arc::new(DriftCoordinator::new(Arc::clone(&ctx)));
        let initial = coord.ledger();
        let per_thread = (self.operations / 4).max(1);

        let pulse = runtime.block_on(async {
            spawn_entropy_pulse(Arc::clone(&coord), Duration::from_millis(50))
        });

        let failures = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let c = Arc::clone(&coord);
                    s.spawn(move || -> Result<(), String> {
                        for i in 0..per_thread {
                            if i % 2 == 0 {
                                check_flux(&c.fork(None))?;
                            } else {
                                check_flux(&c.collapse(None).map_err(|e| e.to_string())?)?;
                            }
                        }
                        Ok(())
                    })
                })
                .collect();
            workers
                .into_iter()
                .filter_map(|w| match w.join() {
                    Ok(Ok(())) => None,
                    Ok(Err(reason)) => Some(reason),
                    Err(_) => Some("worker panicked".to_string()),
                })
                .collect::<Vec<_>>()
        });

        // Let the pulse land a few firings against the finished log
        runtime.block_on(async {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            while pulse.firings() < 3 && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        pulse.stop();
        let firings = pulse.firings();
        runtime.shutdown_timeout(Duration::from_millis(100));

        if let Some(reason) = failures.into_iter().next() {
            return Err(reason);
        }

        let log = coord.operation_log();
        let expected_ops = 4 * per_thread;
        ensure(log.len() == expected_ops, || {
            format!("expected {} records, found {}", expected_ops, log.len())
        })?;
        ensure(firings >= 3, || format!("pulse fired only {} times", firings))?;
        ensure(coord.field().is_within_bounds(), || "field out of bounds".to_string())?;

        let expected = ledger_after(initial, &log).map_err(|e| e.to_string())?;
        let actual = coord.ledger();
        ensure(actual == expected, || {
            format!("ledger {:?} != sum of deltas {:?}", actual, expected)
        })?;

        info!(
            "✓ ContendedPulse complete: {} records, {} pulse firings",
            log.len(),
            firings
        );
        Ok(ScenarioMetrics {
            operations: log.len() as u64,
            ticks: firings,
            echoes: coord.echo_log().len() as u64,
            ..Default::default()
        })
    }

    /// DRIFT-005: ZeroLedgerCollapse - collapse never fails from zero.
    fn run_zero_ledger_collapse(&self) -> Outcome {
        let config = DriftConfig {
            initial_time_salt: 0,
            initial_fragments: 0,
            ..Default::default()
        };
        let coord = DriftCoordinator::with_config(SimContext::shared(self.seed), config)
            .map_err(|e| e.to_string())?;
        let mut metrics = ScenarioMetrics::default();
        let mut previous = coord.ledger();

        for step in 0..self.operations.min(200) {
            coord.collapse(None).map_err(|e| format!("step {}: {}", step, e))?;
            metrics.operations += 1;

            let now = coord.ledger();
            ensure(
                now.time_salt >= previous.time_salt
                    && now.identity_fragments >= previous.identity_fragments,
                || format!("step {}: ledger decreased {:?} -> {:?}", step, previous, now),
            )?;
            previous = now;
        }

        metrics.echoes = coord.echo_log().len() as u64;
        info!(
            "✓ ZeroLedgerCollapse complete: salt={} fragments={}",
            previous.time_salt, previous.identity_fragments
        );
        Ok(metrics)
    }

    /// DRIFT-006: SnapshotRoundtrip - store and reload a busy coordinator.
    fn run_snapshot_roundtrip(&self) -> Outcome {
        let source = self.coordinator();
        let mut metrics = ScenarioMetrics::default();

        for i in 0..self.operations.min(100) {
            match i % 4 {
                0 => {
                    source.fork(None);
                }
                1 => {
                    source.collapse(None).map_err(|e| e.to_string())?;
                }
                2 => {
                    source.resolve(&["▲", "⊗"]).map_err(|e| e.to_string())?;
                    metrics.trials += 1;
                }
                _ => source.tick(),
            }
            metrics.operations += 1;
        }
        source.memory_wipe().map_err(|e| e.to_string())?;
        source.fork(None);

        let path = std::env::temp_dir().join(format!("drift_scenario_{}.json", Uuid::new_v4()));
        let store = JsonFileStore::new(&path);
        let snapshot = source.export();
        store.save(&snapshot).map_err(|e| e.to_string())?;
        let loaded = store.load().map_err(|e| e.to_string());
        let _ = std::fs::remove_file(&path);
        let loaded = loaded?.ok_or_else(|| "snapshot vanished".to_string())?;

        let restored = DriftCoordinator::new(SimContext::shared(self.seed.wrapping_add(1)));
        restored.import(loaded).map_err(|e| e.to_string())?;

        ensure(restored.status() == source.status(), || {
            "restored status differs from source".to_string()
        })?;
        ensure(restored.echo_log() == source.echo_log(), || {
            "restored echo log differs from source".to_string()
        })?;
        ensure(restored.wipe_history() == source.wipe_history(), || {
            "restored wipe history differs from source".to_string()
        })?;

        metrics.echoes = restored.echo_log().len() as u64;
        info!("✓ SnapshotRoundtrip complete: {} echoes restored", metrics.echoes);
        Ok(metrics)
    }

    /// DRIFT-007: FractureShape - fields are kept or redacted, never re-revealed.
    fn run_fracture_shape(&self) -> Outcome {
        let coord = self.coordinator();
        let mut rng = coord.context().entropy_source(103);
        let mut metrics = ScenarioMetrics::default();
        let probability = coord.config().fracture_probability;

        for _ in 0..self.operations.min(100) {
            let record = if rng.gen_bool(0.5) {
                coord.fork(None)
            } else {
                coord.collapse(None).map_err(|e| e.to_string())?
            };
            metrics.operations += 1;

            let source = record.flat_view().map_err(|e| e.to_string())?;
            let once = fracture(&source, probability, &mut rng);
            let twice = fracture(&once, probability, &mut rng);
            metrics.fractured_records += 1;

            let (Value::Object(orig), Value::Object(first), Value::Object(second)) =
                (&source, &once, &twice)
            else {
                return Err("fracture changed the record shape".to_string());
            };
            ensure(orig.keys().eq(first.keys()) && orig.keys().eq(second.keys()), || {
                "fracture changed the field set".to_string()
            })?;

            for (key, value) in orig {
                let after = &first[key];
                ensure(after == value || *after == corrupt_value(value), || {
                    format!("field {} is neither kept nor redacted", key)
                })?;
                if after != value {
                    ensure(&second[key] != value, || {
                        format!("field {} re-revealed by a second fracture", key)
                    })?;
                }
            }
        }

        info!(
            "✓ FractureShape complete: {} records fractured twice",
            metrics.fractured_records
        );
        Ok(metrics)
    }
}

fn check_flux(record: &OperationRecord) -> Result<(), String> {
    ensure((0.0..=1.0).contains(&record.global_flux), || {
        format!(
            "record {} carries flux {} outside [0, 1]",
            record.sequence, record.global_flux
        )
    })
}

fn ledger_after(
    initial: ResourceLedger,
    log: &[OperationRecord],
) -> Result<ResourceLedger, drift_core::DriftError> {
    let total = log
        .iter()
        .fold(ResourceDelta::default(), |acc, r| acc.combine(r.resources));
    let mut ledger = initial;
    ledger.apply(total)?;
    Ok(ledger)
}
