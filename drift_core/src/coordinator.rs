//! The "DRIFT" Coordinator - one exclusive section over the whole simulation.
//!
//! Fork, collapse, memory wipe, scan, tick, alchemy resolution, action
//! results and snapshot export/import each take the same lock for their
//! entire duration. Derived values (ids, yields, echoes) are computed
//! first; the commit that follows cannot fail, so no transaction is ever
//! observable half-applied.

use crate::config::DriftConfig;
use crate::error::DriftError;
use crate::field::{EntropyField, FluxShift, TickMagnitudes, FLUX_MIDPOINT};
use crate::ledger::{ResourceDelta, ResourceLedger};
use crate::records::{
    random_uuid, round_to, AlchemicalPotential, AnomalyEcho, CollapsePayload, DriftMap,
    ForkPayload, OperationPayload, OperationRecord, SentientBehavior, SentientLog, WipePayload,
};
use crate::registry::{CombinationRegistry, MasteryInfo, Resolution, ResolutionContext};
use crate::snapshot::Snapshot;
use drift_env::DriftContext;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Random stream the coordinator draws from.
const COORDINATOR_STREAM: u64 = 1;

/// A ledger adjustment submitted by an external collaborator
/// (mini-game reward, market purchase, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Who produced the result (logged only)
    pub source: String,
    pub time_salt: i64,
    pub fragments: i64,
}

/// Read-only summary of the coordinator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub node_id: String,
    pub entropy_field: EntropyField,
    pub ledger: ResourceLedger,
    pub operations: usize,
    pub echoes: usize,
    pub fractured_echoes: usize,
    pub sentient_logs: usize,
    pub wipes: usize,
    pub known_combinations: usize,
    pub mastery: MasteryInfo,
}

/// Everything guarded by the exclusive section.
struct DriftState {
    node_id: String,
    field: EntropyField,
    ledger: ResourceLedger,
    operation_log: Vec<OperationRecord>,
    echo_log: Vec<AnomalyEcho>,
    wipe_history: Vec<OperationRecord>,
    sentient_logs: Vec<SentientLog>,
    registry: CombinationRegistry,
    next_sequence: u64,
    rng: Box<dyn RngCore + Send>,
}

impl DriftState {
    fn next_record(
        &mut self,
        timestamp_ms: u64,
        resources: ResourceDelta,
        global_flux: f64,
        payload: OperationPayload,
    ) -> OperationRecord {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        OperationRecord {
            sequence,
            timestamp_ms,
            resources,
            global_flux,
            payload,
        }
    }

    fn flux_after(&self, shift: FluxShift) -> EntropyField {
        let mut next = self.field.clone();
        next.apply_shift(shift);
        next
    }
}

/// The simulation coordinator.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct DriftCoordinator<Ctx: DriftContext> {
    ctx: Arc<Ctx>,
    config: DriftConfig,
    magnitudes: TickMagnitudes,
    state: Mutex<DriftState>,
}

impl<Ctx: DriftContext> DriftCoordinator<Ctx> {
    /// Creates a coordinator with the default configuration.
    pub fn new(ctx: Arc<Ctx>) -> Self {
        Self::build(ctx, DriftConfig::default())
    }

    /// Creates a coordinator with a validated configuration.
    pub fn with_config(ctx: Arc<Ctx>, config: DriftConfig) -> Result<Self, DriftError> {
        config.validate()?;
        Ok(Self::build(ctx, config))
    }

    fn build(ctx: Arc<Ctx>, config: DriftConfig) -> Self {
        let mut rng = ctx.entropy_source(COORDINATOR_STREAM);
        let field = EntropyField::initialize(&config.zones, &config.glyphs, &mut rng);
        let registry = CombinationRegistry::seeded()
            .with_limits(config.mastery_ceiling, config.history_capacity);

        let state = DriftState {
            node_id: config.node_id.clone(),
            field,
            ledger: ResourceLedger::new(config.initial_time_salt, config.initial_fragments),
            operation_log: Vec::new(),
            echo_log: Vec::new(),
            wipe_history: Vec::new(),
            sentient_logs: Vec::new(),
            registry,
            next_sequence: 0,
            rng,
        };

        info!(
            node = %config.node_id,
            seed = ctx.seed(),
            "Drift coordinator initialized"
        );

        Self {
            ctx,
            config,
            magnitudes: TickMagnitudes::default(),
            state: Mutex::new(state),
        }
    }

    /// Enters the exclusive section.
    ///
    /// A poisoned lock is recovered: commits cannot fail midway, so the
    /// state behind it is always whole.
    fn lock(&self) -> MutexGuard<'_, DriftState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.ctx
    }

    // ========================================================================
    // NODE LIFECYCLE
    // ========================================================================

    /// Forks `base` (or the root node) into a new node id.
    pub fn fork(&self, base: Option<&str>) -> OperationRecord {
        let timestamp_ms = self.ctx.timestamp_ms();
        let mut guard = self.lock();
        let state = &mut *guard;

        let parent = base.map_or_else(|| state.node_id.clone(), str::to_string);
        let node_id = format!("{}-{}", parent, state.rng.gen_range(1000..=9999));
        let glyph_state: Vec<String> = self
            .config
            .glyphs
            .choose_multiple(&mut state.rng, self.config.fork_glyph_sample)
            .cloned()
            .collect();
        let entropy_level = round_to(state.field.global_flux, 3);
        let alchemy_potential = fork_potential(&node_id, &state.registry, &mut state.rng);

        let sentience_probability = state.rng.gen_range(0.0..=0.3);
        let sentient = (sentience_probability > self.config.sentience_threshold).then(|| {
            SentientLog {
                log_id: node_id.clone(),
                origin: parent.clone(),
                created_ms: timestamp_ms,
                sentience_level: state.rng.gen_range(0.1..=0.8),
                autonomy_level: state.rng.gen_range(0.0..=0.5),
                behavior: SentientBehavior::ALL
                    .choose(&mut state.rng)
                    .copied()
                    .unwrap_or(SentientBehavior::Observer),
            }
        });

        // Commit
        state.field.apply_shift(FluxShift::Scale(1.05));
        let payload = OperationPayload::Fork(ForkPayload {
            node_id: node_id.clone(),
            parent_node: parent,
            glyph_state,
            entropy_level,
            alchemy_potential,
            sentience_probability,
            sentient_log: sentient.as_ref().map(|s| s.log_id.clone()),
        });
        let global_flux = state.field.global_flux;
        let record = state.next_record(timestamp_ms, ResourceDelta::default(), global_flux, payload);
        state.operation_log.push(record.clone());

        if let Some(log) = sentient {
            info!(node = %log.log_id, behavior = ?log.behavior, "Sentient log emerged");
            state.sentient_logs.push(log);
        }

        info!(node = %node_id, flux = global_flux, "Fork committed");
        record
    }

    /// Collapses `id` (or the root node), releasing resources and an echo.
    pub fn collapse(&self, id: Option<&str>) -> Result<OperationRecord, DriftError> {
        let timestamp_ms = self.ctx.timestamp_ms();
        let mut guard = self.lock();
        let state = &mut *guard;

        let node_id = id.map_or_else(|| state.node_id.clone(), str::to_string);
        let sigil = self
            .config
            .glyphs
            .choose(&mut state.rng)
            .cloned()
            .unwrap_or_default();
        let entropy_release = round_to(state.field.global_flux * 0.1, 3);
        let time_salt: u64 = state.rng.gen_range(1..=5);
        let fragments: u64 = state.rng.gen_range(0..=3);
        let echo_id = random_uuid(&mut state.rng);

        let next_field = state.flux_after(FluxShift::Scale(0.95));
        let payload = OperationPayload::Collapse(CollapsePayload {
            node_id: node_id.clone(),
            sigil,
            entropy_release,
            time_salt_generated: time_salt,
            fragments_released: fragments,
            echo_id,
        });
        let record = OperationRecord {
            sequence: state.next_sequence,
            timestamp_ms,
            resources: ResourceDelta::new(time_salt as i64, fragments as i64),
            global_flux: next_field.global_flux,
            payload,
        };
        let echo = AnomalyEcho::capture(echo_id, &record, timestamp_ms, None, &mut state.rng)?;

        // Commit
        state.next_sequence += 1;
        state.ledger.credit(time_salt, fragments);
        state.field = next_field;
        state.echo_log.push(echo);
        state.operation_log.push(record.clone());

        info!(
            node = %node_id,
            time_salt,
            fragments,
            flux = state.field.global_flux,
            "Collapse committed"
        );
        Ok(record)
    }

    /// Erases the operation log, leaving fractured echoes of up to
    /// `wipe_echo_sample` entries behind.
    ///
    /// The returned summary goes to the wipe history, never back into the
    /// (now empty) operation log.
    pub fn memory_wipe(&self) -> Result<OperationRecord, DriftError> {
        let timestamp_ms = self.ctx.timestamp_ms();
        let mut guard = self.lock();
        let state = &mut *guard;

        let wiped = state.operation_log.len();
        let sample: Vec<&OperationRecord> = state
            .operation_log
            .choose_multiple(&mut state.rng, self.config.wipe_echo_sample.min(wiped))
            .collect();

        let mut echoes = Vec::with_capacity(sample.len());
        for record in sample {
            let id = random_uuid(&mut state.rng);
            echoes.push(AnomalyEcho::capture(
                id,
                record,
                timestamp_ms,
                Some(self.config.fracture_probability),
                &mut state.rng,
            )?);
        }

        let time_salt = 2 * wiped as u64;
        let payload = OperationPayload::MemoryWipe(WipePayload {
            operations_wiped: wiped,
            time_salt_generated: time_salt,
            fractured_echoes: echoes.iter().map(|e| e.id).collect(),
        });

        // Commit
        state.operation_log.clear();
        state.ledger.credit(time_salt, 0);
        state.field.apply_shift(FluxShift::Set(FLUX_MIDPOINT));
        state.echo_log.extend(echoes);
        let record = state.next_record(
            timestamp_ms,
            ResourceDelta::new(time_salt as i64, 0),
            state.field.global_flux,
            payload,
        );
        state.wipe_history.push(record.clone());

        info!(wiped, time_salt, "Memory wipe committed");
        Ok(record)
    }

    /// Regenerates the drift map from the current symbol harmonics.
    ///
    /// Each glyph appears `max(1, round(harmonic * 10))` times in the
    /// sampling pool. Nothing is logged.
    pub fn scan(&self) -> DriftMap {
        let mut guard = self.lock();
        let state = &mut *guard;

        let pool: Vec<&String> = self
            .config
            .glyphs
            .iter()
            .flat_map(|glyph| {
                let weight = (state.field.harmonic(glyph) * 10.0).round().max(1.0) as usize;
                std::iter::repeat(glyph).take(weight)
            })
            .collect();

        let rows = (0..self.config.drift_map_height)
            .map(|_| {
                (0..self.config.drift_map_width)
                    .map(|_| {
                        pool.choose(&mut state.rng)
                            .map(|g| g.to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        debug!(pool = pool.len(), "Drift map regenerated");
        DriftMap { rows }
    }

    /// One entropy field update.
    pub fn tick(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.field.tick(&self.magnitudes, &mut state.rng);
        debug!(flux = state.field.global_flux, "Entropy tick");
    }

    // ========================================================================
    // ALCHEMY AND COLLABORATORS
    // ========================================================================

    /// Resolves a glyph combination against the registry, with the entropy
    /// influence drawn from the live global flux.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Resolution, DriftError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let flux = state.field.global_flux;
        let entropy_influence = if flux > 0.7 {
            state.rng.gen_range(0.7..=1.3)
        } else if flux < 0.3 {
            state.rng.gen_range(0.9..=1.1)
        } else {
            state.rng.gen_range(0.8..=1.2)
        };

        let resolution = state.registry.resolve(
            tokens,
            ResolutionContext { entropy_influence },
            &mut state.rng,
        )?;

        info!(
            key = %resolution.key,
            outcome = ?resolution.outcome.branch(),
            success = resolution.is_success(),
            "Combination resolved"
        );
        Ok(resolution)
    }

    /// Applies a collaborator's ledger delta, all or nothing.
    pub fn apply_action(&self, action: &ActionResult) -> Result<ResourceDelta, DriftError> {
        let delta = ResourceDelta::new(action.time_salt, action.fragments);
        let mut state = self.lock();

        match state.ledger.apply(delta) {
            Ok(()) => {
                info!(source = %action.source, ?delta, "Action applied");
                Ok(delta)
            }
            Err(err) => {
                warn!(source = %action.source, "Action rejected: {}", err);
                Err(err)
            }
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn status(&self) -> StatusReport {
        let state = self.lock();
        StatusReport {
            node_id: state.node_id.clone(),
            entropy_field: state.field.clone(),
            ledger: state.ledger,
            operations: state.operation_log.len(),
            echoes: state.echo_log.len(),
            fractured_echoes: state.echo_log.iter().filter(|e| e.fractured()).count(),
            sentient_logs: state.sentient_logs.len(),
            wipes: state.wipe_history.len(),
            known_combinations: state.registry.known_count(),
            mastery: state.registry.mastery_info(),
        }
    }

    pub fn field(&self) -> EntropyField {
        self.lock().field.clone()
    }

    pub fn ledger(&self) -> ResourceLedger {
        self.lock().ledger
    }

    pub fn operation_log(&self) -> Vec<OperationRecord> {
        self.lock().operation_log.clone()
    }

    pub fn echo_log(&self) -> Vec<AnomalyEcho> {
        self.lock().echo_log.clone()
    }

    pub fn wipe_history(&self) -> Vec<OperationRecord> {
        self.lock().wipe_history.clone()
    }

    pub fn sentient_logs(&self) -> Vec<SentientLog> {
        self.lock().sentient_logs.clone()
    }

    pub fn mastery_info(&self) -> MasteryInfo {
        self.lock().registry.mastery_info()
    }

    /// Drops the oldest echoes beyond `keep`, returning how many went.
    pub fn prune_echoes(&self, keep: usize) -> usize {
        let mut state = self.lock();
        let excess = state.echo_log.len().saturating_sub(keep);
        state.echo_log.drain(..excess);
        if excess > 0 {
            debug!(pruned = excess, "Echo log pruned");
        }
        excess
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Point-in-time copy of the whole simulation.
    pub fn export(&self) -> Snapshot {
        let saved_ms = self.ctx.timestamp_ms();
        let state = self.lock();
        let snapshot = Snapshot {
            node_id: state.node_id.clone(),
            saved_ms,
            entropy_field: state.field.clone(),
            ledger: state.ledger,
            operation_log: state.operation_log.clone(),
            echo_log: state.echo_log.clone(),
            wipe_history: state.wipe_history.clone(),
            sentient_logs: state.sentient_logs.clone(),
            registry: state.registry.export_state(),
            next_sequence: state.next_sequence,
        };
        debug!(operations = snapshot.operation_log.len(), "Snapshot exported");
        snapshot
    }

    /// Replaces the simulation with `snapshot`.
    ///
    /// The snapshot is validated in full first; on error the current state
    /// is left untouched.
    pub fn import(&self, snapshot: Snapshot) -> Result<(), DriftError> {
        snapshot.validate()?;

        let highest = snapshot
            .operation_log
            .iter()
            .chain(&snapshot.wipe_history)
            .map(|r| r.sequence + 1)
            .max()
            .unwrap_or(0);

        let mut state = self.lock();
        state.node_id = snapshot.node_id;
        state.field = snapshot.entropy_field;
        state.ledger = snapshot.ledger;
        state.operation_log = snapshot.operation_log;
        state.echo_log = snapshot.echo_log;
        state.wipe_history = snapshot.wipe_history;
        state.sentient_logs = snapshot.sentient_logs;
        state.registry.restore(snapshot.registry);
        state.next_sequence = snapshot.next_sequence.max(highest);

        info!(
            node = %state.node_id,
            operations = state.operation_log.len(),
            echoes = state.echo_log.len(),
            "Snapshot imported"
        );
        Ok(())
    }
}

/// Advisory alchemical reading of a fork id.
fn fork_potential<R: Rng + ?Sized>(
    node_id: &str,
    registry: &CombinationRegistry,
    rng: &mut R,
) -> AlchemicalPotential {
    let total = node_id.chars().count().max(1);
    let distinct = node_id.chars().collect::<HashSet<_>>().len();

    AlchemicalPotential {
        pattern_strength: round_to(distinct as f64 / total as f64, 2),
        resonance_potential: round_to(rng.gen_range(0.1..=0.9), 2),
        stability_bias: round_to(rng.gen_range(-0.2..=0.2), 2),
        elemental_inclination: registry.table().elements().choose(rng).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EchoData, OperationKind};
    use approx::assert_relative_eq;
    use drift_env::SimContext;
    use proptest::prelude::*;

    fn coordinator(seed: u64) -> DriftCoordinator<SimContext> {
        DriftCoordinator::new(SimContext::shared(seed))
    }

    fn ledger_sum(initial: ResourceLedger, log: &[OperationRecord]) -> ResourceLedger {
        let total = log
            .iter()
            .fold(ResourceDelta::default(), |acc, r| acc.combine(r.resources));
        let mut ledger = initial;
        ledger.apply(total).unwrap();
        ledger
    }

    #[test]
    fn test_fork_derives_child_id() {
        let coord = coordinator(1);
        let before = coord.field().global_flux;

        let record = coord.fork(None);
        let OperationPayload::Fork(fork) = &record.payload else {
            panic!("expected fork payload");
        };

        let suffix = fork.node_id.strip_prefix("Xi-Void-404-").unwrap();
        let n: u32 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
        assert_eq!(fork.parent_node, "Xi-Void-404");
        assert_eq!(fork.glyph_state.len(), 3);
        assert!(fork.alchemy_potential.pattern_strength > 0.0);
        assert!(fork.alchemy_potential.pattern_strength <= 1.0);
        assert_relative_eq!(record.global_flux, (before * 1.05).min(1.0), epsilon = 1e-12);
        assert!(record.resources.is_zero());
        assert_eq!(coord.operation_log().len(), 1);
    }

    #[test]
    fn test_fork_from_explicit_base() {
        let coord = coordinator(2);
        let record = coord.fork(Some("Nu-Echo-7"));
        assert!(record.node_id().unwrap().starts_with("Nu-Echo-7-"));
    }

    #[test]
    fn test_sentient_logs_reference_forks() {
        let coord = coordinator(3);
        for _ in 0..100 {
            coord.fork(None);
        }

        let logs = coord.sentient_logs();
        let referenced: Vec<String> = coord
            .operation_log()
            .iter()
            .filter_map(|r| match &r.payload {
                OperationPayload::Fork(f) => f.sentient_log.clone(),
                _ => None,
            })
            .collect();

        assert_eq!(logs.len(), referenced.len());
        // P(sentience > 0.2) = 1/3
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|l| (0.1..=0.8).contains(&l.sentience_level)));
    }

    #[test]
    fn test_collapse_credits_and_echoes() {
        let coord = coordinator(4);
        let before_flux = coord.field().global_flux;
        let before = coord.ledger();

        let record = coord.collapse(None).unwrap();
        let OperationPayload::Collapse(collapse) = &record.payload else {
            panic!("expected collapse payload");
        };

        assert!((1..=5).contains(&collapse.time_salt_generated));
        assert!(collapse.fragments_released <= 3);
        assert_relative_eq!(collapse.entropy_release, round_to(before_flux * 0.1, 3));
        assert_relative_eq!(coord.field().global_flux, before_flux * 0.95, epsilon = 1e-12);

        let after = coord.ledger();
        assert_eq!(after.time_salt, before.time_salt + collapse.time_salt_generated);
        assert_eq!(
            after.identity_fragments,
            before.identity_fragments + collapse.fragments_released
        );

        let echoes = coord.echo_log();
        assert_eq!(echoes.len(), 1);
        assert_eq!(echoes[0].id, collapse.echo_id);
        assert_eq!(echoes[0].source_kind, OperationKind::Collapse);
        assert!(matches!(echoes[0].data, EchoData::SourceData(_)));
    }

    #[test]
    fn test_collapse_from_empty_ledger() {
        let config = DriftConfig {
            initial_time_salt: 0,
            initial_fragments: 0,
            ..Default::default()
        };
        let coord = DriftCoordinator::with_config(SimContext::shared(5), config).unwrap();

        let mut previous = coord.ledger();
        for _ in 0..50 {
            coord.collapse(Some("Omega")).unwrap();
            let now = coord.ledger();
            assert!(now.time_salt > previous.time_salt);
            assert!(now.identity_fragments >= previous.identity_fragments);
            previous = now;
        }
    }

    #[test]
    fn test_memory_wipe_accounting() {
        let coord = coordinator(6);
        for _ in 0..5 {
            coord.fork(None);
        }
        coord.collapse(None).unwrap();
        coord.collapse(None).unwrap();

        let salt_before = coord.ledger().time_salt;
        let echoes_before = coord.echo_log().len();

        let record = coord.memory_wipe().unwrap();
        let OperationPayload::MemoryWipe(wipe) = &record.payload else {
            panic!("expected wipe payload");
        };

        assert_eq!(wipe.operations_wiped, 7);
        assert!(coord.operation_log().is_empty());
        assert_eq!(coord.ledger().time_salt, salt_before + 14);
        assert_eq!(coord.field().global_flux, 0.5);
        assert_eq!(wipe.fractured_echoes.len(), 3);

        let echoes = coord.echo_log();
        assert_eq!(echoes.len(), echoes_before + 3);
        assert!(echoes[echoes_before..].iter().all(|e| e.fractured()));
        assert_eq!(coord.wipe_history(), vec![record]);
    }

    #[test]
    fn test_wipe_echo_keeps_field_halves() {
        let config = DriftConfig {
            fracture_probability: 1.0,
            ..Default::default()
        };
        let coord = DriftCoordinator::with_config(SimContext::shared(16), config).unwrap();
        let record = coord.fork(None);
        let OperationPayload::Fork(fork) = &record.payload else {
            panic!("expected fork payload");
        };
        coord.memory_wipe().unwrap();

        let echoes = coord.echo_log();
        assert_eq!(echoes.len(), 1);
        let EchoData::CorruptedData(corrupted) = &echoes[0].data else {
            panic!("expected corrupted data");
        };

        // "Xi-Void-404-NNNN" keeps its first eight characters
        let kept: String = fork.node_id.chars().take(fork.node_id.chars().count() / 2).collect();
        let node_id = corrupted["node_id"].as_str().unwrap();
        assert!(node_id.starts_with(&kept));
        assert!(node_id.ends_with('█'));
        assert_eq!(node_id.chars().count(), fork.node_id.chars().count());

        let glyphs = corrupted["glyph_state"].as_array().unwrap();
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0], fork.glyph_state[0].as_str());
        assert_eq!(glyphs[1], "█");
        assert_eq!(glyphs[2], "█");

        assert_eq!(corrupted["sequence"], "###");
        assert_eq!(corrupted["alchemy_potential"], "█████");
        assert!(corrupted.get("payload").is_none());
    }

    #[test]
    fn test_memory_wipe_empty_log() {
        let coord = coordinator(7);
        let before = coord.ledger();

        let record = coord.memory_wipe().unwrap();
        assert!(record.resources.is_zero());
        assert_eq!(coord.ledger(), before);
        assert_eq!(coord.field().global_flux, 0.5);
        assert!(coord.echo_log().is_empty());
    }

    #[test]
    fn test_scan_shape() {
        let coord = coordinator(8);
        let map = coord.scan();

        assert_eq!(map.width(), 5);
        assert_eq!(map.height(), 5);
        let glyphs = &coord.config().glyphs;
        assert!(map.cells().all(|c| glyphs.iter().any(|g| g == c)));
        assert!(coord.operation_log().is_empty());
    }

    #[test]
    fn test_apply_action_all_or_nothing() {
        let coord = coordinator(9);
        let before = coord.ledger();

        let err = coord.apply_action(&ActionResult {
            source: "market".into(),
            time_salt: -10,
            fragments: -1000,
        });
        assert!(matches!(
            err,
            Err(DriftError::InsufficientResource {
                resource: "identity_fragments",
                ..
            })
        ));
        assert_eq!(coord.ledger(), before);

        let delta = coord
            .apply_action(&ActionResult {
                source: "rune_puzzle".into(),
                time_salt: 6,
                fragments: -2,
            })
            .unwrap();
        assert_eq!(delta, ResourceDelta::new(6, -2));
        assert_eq!(coord.ledger().time_salt, before.time_salt + 6);
        assert_eq!(coord.ledger().identity_fragments, before.identity_fragments - 2);
    }

    #[test]
    fn test_resolve_raises_mastery() {
        let coord = coordinator(10);
        coord.resolve(&["▲", "⊗"]).unwrap();
        coord.resolve(&["∆", "≈", "▲"]).unwrap();

        let info = coord.mastery_info();
        assert_eq!(info.transmutations, 2);
        assert!(info.level > 0.0);
        assert!(matches!(
            coord.resolve(&["▲"]),
            Err(DriftError::InvalidArity { given: 1 })
        ));
    }

    #[test]
    fn test_prune_echoes_keeps_newest() {
        let coord = coordinator(11);
        for _ in 0..6 {
            coord.collapse(None).unwrap();
        }
        let newest = coord.echo_log().last().unwrap().id;

        assert_eq!(coord.prune_echoes(2), 4);
        let echoes = coord.echo_log();
        assert_eq!(echoes.len(), 2);
        assert_eq!(echoes[1].id, newest);
        assert_eq!(coord.prune_echoes(10), 0);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let source = coordinator(12);
        source.fork(None);
        source.collapse(None).unwrap();
        source.resolve(&["≈", "∇"]).unwrap();
        let snapshot = source.export();

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = coordinator(99);
        restored.import(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.field(), source.field());
        assert_eq!(restored.ledger(), source.ledger());
        assert_eq!(restored.operation_log(), source.operation_log());
        assert_eq!(restored.echo_log(), source.echo_log());
        assert_eq!(restored.mastery_info(), source.mastery_info());

        let next = restored.fork(None);
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn test_import_rejects_out_of_range() {
        let coord = coordinator(13);
        let before = coord.field();

        let mut snapshot = coord.export();
        snapshot.entropy_field.global_flux = 1.5;
        assert!(matches!(
            coord.import(snapshot),
            Err(DriftError::CorruptSnapshot(_))
        ));
        assert_eq!(coord.field(), before);
    }

    #[test]
    fn test_concurrent_tick_and_fork() {
        let coord = Arc::new(coordinator(14));
        let initial = coord.ledger();

        std::thread::scope(|s| {
            for _ in 0..4 {
                let c = Arc::clone(&coord);
                s.spawn(move || {
                    for _ in 0..250 {
                        c.tick();
                    }
                });
            }
            for _ in 0..4 {
                let c = Arc::clone(&coord);
                s.spawn(move || {
                    for i in 0..100 {
                        if i % 2 == 0 {
                            c.fork(None);
                        } else {
                            c.collapse(None).unwrap();
                        }
                    }
                });
            }
        });

        let log = coord.operation_log();
        assert_eq!(log.len(), 400);
        assert!(log.iter().all(|r| (0.0..=1.0).contains(&r.global_flux)));
        assert!(coord.field().is_within_bounds());
        assert_eq!(coord.ledger(), ledger_sum(initial, &log));

        let sequences: HashSet<u64> = log.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences.len(), 400);
    }

    proptest! {
        #[test]
        fn test_field_bounded_under_any_sequence(
            seed in any::<u64>(),
            ops in prop::collection::vec(0u8..5, 1..60),
        ) {
            let coord = coordinator(seed);
            for op in ops {
                match op {
                    0 => { coord.tick(); }
                    1 => { coord.fork(None); }
                    2 => { coord.collapse(None).unwrap(); }
                    3 => { coord.memory_wipe().unwrap(); }
                    _ => { coord.scan(); }
                }
                prop_assert!(coord.field().is_within_bounds());
            }
        }
    }
}
