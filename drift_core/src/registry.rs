//! The "ALCHEMY" Registry - known combinations keyed by [`PatternKey`].
//!
//! Each key moves one way, `unknown -> known`. A resolution either replays a
//! known combination (mastery- and entropy-adjusted, on a copy) or attempts a
//! discovery whose probability follows the elemental resonance of the
//! inputs. Only a successful discovery inserts into the registry.

use crate::error::DriftError;
use crate::glyphs::{name_words_for, Element, ElementalTable, BASE_GLYPHS, FAILURE_GLYPH, HYBRID_GLYPHS};
use crate::pattern::PatternKey;
use crate::records::round_to;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Mastery gained per resolution (doubled on discovery).
const MASTERY_STEP: f64 = 0.01;

/// Discovery probability never exceeds this.
const MAX_DISCOVERY_CHANCE: f64 = 0.8;

/// Maximum property tags on a synthesized record.
const MAX_PROPERTIES: usize = 4;

const NAME_SUFFIXES: [&str; 4] = ["Synthesis", "Fusion", "Convergence", "Amalgam"];

const FAILURE_NAMES: [&str; 5] = [
    "Resonance Collapse",
    "Elemental Rejection",
    "Pattern Instability",
    "Entropy Overflow",
    "Harmonic Interference",
];

/// A known combination. Stored records are never modified after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationRecord {
    pub result_symbol: String,
    pub name: String,
    pub properties: Vec<String>,
    /// Potency in [0, 1]
    pub potency: f64,
    /// Stability in [0, 1]
    pub stability: f64,
    /// Entropy cost in [0, 1]
    pub entropy_cost: f64,
}

impl CombinationRecord {
    fn new(symbol: &str, name: &str, properties: &[&str], potency: f64, stability: f64, entropy_cost: f64) -> Self {
        Self {
            result_symbol: symbol.to_string(),
            name: name.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
            potency,
            stability,
            entropy_cost,
        }
    }

    fn in_bounds(&self) -> bool {
        [self.potency, self.stability, self.entropy_cost]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

/// Rarity tier derived from potency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn from_potency(potency: f64) -> Self {
        if potency >= 0.9 {
            Rarity::Legendary
        } else if potency >= 0.7 {
            Rarity::Epic
        } else if potency >= 0.5 {
            Rarity::Rare
        } else if potency >= 0.3 {
            Rarity::Uncommon
        } else {
            Rarity::Common
        }
    }
}

/// Side effect reported by a failed combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureEffect {
    GlyphScatter,
    EnergyDischarge,
    TemporalFlux,
    VoidBreach,
    StabilityLoss,
}

impl FailureEffect {
    pub const ALL: [FailureEffect; 5] = [
        FailureEffect::GlyphScatter,
        FailureEffect::EnergyDischarge,
        FailureEffect::TemporalFlux,
        FailureEffect::VoidBreach,
        FailureEffect::StabilityLoss,
    ];
}

/// Which branch a resolution took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Known,
    Discovery,
}

/// Inputs supplied by the caller at resolution time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionContext {
    /// Multiplier applied to a known combination's stability
    pub entropy_influence: f64,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self {
            entropy_influence: 1.0,
        }
    }
}

/// Result payload of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Replay of a known combination; `record` is the adjusted copy
    Known {
        record: CombinationRecord,
        rarity: Rarity,
        mastery_bonus: f64,
        entropy_modifier: f64,
    },
    /// First synthesis of a new combination (now stored)
    Discovery {
        record: CombinationRecord,
        rarity: Rarity,
        avg_resonance: f64,
    },
    /// Failed roll; `record` is the failure sentinel
    Failure {
        branch: Branch,
        record: CombinationRecord,
        effect: FailureEffect,
    },
}

impl Outcome {
    pub fn branch(&self) -> Branch {
        match self {
            Outcome::Known { .. } => Branch::Known,
            Outcome::Discovery { .. } => Branch::Discovery,
            Outcome::Failure { branch, .. } => *branch,
        }
    }

    pub fn record(&self) -> &CombinationRecord {
        match self {
            Outcome::Known { record, .. }
            | Outcome::Discovery { record, .. }
            | Outcome::Failure { record, .. } => record,
        }
    }
}

/// One resolution, as returned to the caller and kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub key: PatternKey,
    pub tokens: Vec<String>,
    /// Success probability that was rolled against
    pub chance: f64,
    pub mastery_at_time: f64,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failure { .. })
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self.outcome, Outcome::Discovery { .. })
    }
}

/// Mastery summary for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryInfo {
    pub level: f64,
    pub transmutations: u64,
    pub known_patterns: usize,
    /// Discoveries in retained history, as a percentage of all transmutations
    pub discovery_rate: f64,
    /// Fractional part of the level, as a percentage
    pub next_level_progress: f64,
}

/// Persisted registry contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub combinations: BTreeMap<PatternKey, CombinationRecord>,
    pub mastery_level: f64,
    pub transmutations: u64,
    #[serde(default)]
    pub history: Vec<Resolution>,
}

/// Registry of known combinations plus the alchemist's mastery.
#[derive(Debug, Clone)]
pub struct CombinationRegistry {
    known: HashMap<PatternKey, CombinationRecord>,
    table: ElementalTable,
    mastery: f64,
    mastery_ceiling: f64,
    transmutations: u64,
    history: Vec<Resolution>,
    history_capacity: usize,
}

impl CombinationRegistry {
    /// Creates a registry with no known combinations.
    pub fn empty(table: ElementalTable) -> Self {
        Self {
            known: HashMap::new(),
            table,
            mastery: 0.0,
            mastery_ceiling: 10.0,
            transmutations: 0,
            history: Vec::new(),
            history_capacity: 1000,
        }
    }

    /// Creates the standard registry: base-glyph table plus the five
    /// fundamental combinations.
    pub fn seeded() -> Self {
        let mut registry = Self::empty(ElementalTable::standard());
        let [void, energy, flow, stability, change] = BASE_GLYPHS;

        let fundamentals = [
            (vec![void, energy], CombinationRecord::new("⚡", "Void Lightning", &["energy", "piercing", "unstable"], 0.7, 0.4, 0.1)),
            (vec![energy, flow], CombinationRecord::new("∾", "Infinite Spiral", &["recursive", "growth", "time"], 0.6, 0.8, 0.15)),
            (vec![flow, stability], CombinationRecord::new("◊", "Crystal Resonance", &["structure", "amplification", "memory"], 0.8, 0.9, 0.05)),
            (vec![void, energy, flow], CombinationRecord::new("⟐", "Triadic Void", &["balance", "synthesis", "transcendence"], 0.9, 0.6, 0.25)),
            (vec![energy, stability, change], CombinationRecord::new("⧨", "Convergent Matrix", &["convergence", "power", "danger"], 1.0, 0.3, 0.4)),
        ];

        for (tokens, record) in fundamentals {
            if let Ok(key) = PatternKey::encode(tokens.as_slice()) {
                registry.known.insert(key, record);
            }
        }
        registry
    }

    /// Overrides the mastery ceiling and history capacity.
    pub fn with_limits(mut self, mastery_ceiling: f64, history_capacity: usize) -> Self {
        self.mastery_ceiling = mastery_ceiling;
        self.history_capacity = history_capacity.max(2);
        self
    }

    pub fn table(&self) -> &ElementalTable {
        &self.table
    }

    /// Pure read of a stored record.
    pub fn lookup(&self, key: &PatternKey) -> Option<&CombinationRecord> {
        self.known.get(key)
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn mastery(&self) -> f64 {
        self.mastery
    }

    pub fn transmutations(&self) -> u64 {
        self.transmutations
    }

    /// Retained resolutions, oldest first.
    pub fn history(&self) -> &[Resolution] {
        &self.history
    }

    /// Resolves an unordered token set.
    ///
    /// Arity is checked before any lookup. Every successful call records the
    /// resolution and raises mastery, failures included.
    pub fn resolve<S, R>(
        &mut self,
        tokens: &[S],
        context: ResolutionContext,
        rng: &mut R,
    ) -> Result<Resolution, DriftError>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let key = PatternKey::encode(tokens)?;
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        let mastery_at_time = self.mastery;

        let (chance, outcome) = match self.known.get(&key) {
            Some(stored) => self.known_outcome(stored, context, rng),
            None => self.discovery_outcome(&tokens, rng),
        };

        if let Outcome::Discovery { record, .. } = &outcome {
            debug!(key = %key, name = %record.name, "combination discovered");
            self.known.insert(key.clone(), record.clone());
        }

        let resolution = Resolution {
            key,
            tokens,
            chance,
            mastery_at_time,
            outcome,
        };

        let gain = if resolution.is_discovery() {
            MASTERY_STEP * 2.0
        } else {
            MASTERY_STEP
        };
        self.mastery = (self.mastery + gain).min(self.mastery_ceiling);
        self.record_history(resolution.clone());

        Ok(resolution)
    }

    fn known_outcome<R: Rng + ?Sized>(
        &self,
        stored: &CombinationRecord,
        context: ResolutionContext,
        rng: &mut R,
    ) -> (f64, Outcome) {
        let mastery_bonus = self.mastery * 0.1;
        let stability = stored.stability * context.entropy_influence;
        let chance = stability * (0.5 + mastery_bonus);

        // The roll uses the unclamped stability; the returned copy is clamped.
        let mut record = stored.clone();
        record.potency = (record.potency + mastery_bonus).min(1.0);
        record.stability = stability.clamp(0.0, 1.0);

        if rng.gen::<f64>() < chance {
            let rarity = Rarity::from_potency(record.potency);
            (
                chance,
                Outcome::Known {
                    record,
                    rarity,
                    mastery_bonus,
                    entropy_modifier: context.entropy_influence,
                },
            )
        } else {
            (chance, failure(Branch::Known, rng))
        }
    }

    fn discovery_outcome<R: Rng + ?Sized>(&self, tokens: &[String], rng: &mut R) -> (f64, Outcome) {
        let avg_resonance = self.table.average_resonance(tokens);
        let chance = (avg_resonance * 0.3 + self.mastery * 0.1).min(MAX_DISCOVERY_CHANCE);

        if rng.gen::<f64>() < chance {
            let record = self.synthesize(tokens, avg_resonance, rng);
            let rarity = Rarity::from_potency(record.potency);
            (
                chance,
                Outcome::Discovery {
                    record,
                    rarity,
                    avg_resonance,
                },
            )
        } else {
            (chance, failure(Branch::Discovery, rng))
        }
    }

    /// Builds a new record from the inputs' elements and resonance.
    fn synthesize<R: Rng + ?Sized>(&self, tokens: &[String], resonance: f64, rng: &mut R) -> CombinationRecord {
        let elements: Vec<Option<Element>> = tokens.iter().map(|t| self.table.element_of(t)).collect();
        let mut unique: Vec<Option<Element>> = Vec::new();
        for e in &elements {
            if !unique.contains(e) {
                unique.push(*e);
            }
        }

        let count = |e: &Option<Element>| elements.iter().filter(|x| *x == e).count();
        let primary = unique
            .iter()
            .copied()
            .fold(None, |best: Option<Option<Element>>, e| match best {
                Some(b) if count(&b) >= count(&e) => Some(b),
                _ => Some(e),
            })
            .flatten();
        let secondary = unique.iter().copied().find(|e| *e != primary);

        let mut words: Vec<&str> = name_words_for(primary).to_vec();
        if let Some(second) = secondary {
            words.extend_from_slice(name_words_for(second));
        }
        let word = words.choose(rng).copied().unwrap_or("Unknown");
        let suffix = NAME_SUFFIXES.choose(rng).copied().unwrap_or("Synthesis");

        let mut properties: Vec<String> = Vec::new();
        for element in unique.iter().flatten() {
            for tag in element.property_pool().choose_multiple(rng, 2) {
                if !properties.iter().any(|p| p == tag) {
                    properties.push(tag.to_string());
                }
            }
        }
        properties.truncate(MAX_PROPERTIES);

        let complexity = tokens.len() as f64 / 5.0;
        let potency = (resonance * 0.8 + complexity * 0.3 + rng.gen_range(0.0..=0.2)).min(1.0);
        let stability = (resonance * 0.9 - complexity * 0.2).clamp(0.1, 0.9);
        let entropy_cost = (complexity * 0.2 + (1.0 - resonance) * 0.1).clamp(0.0, 1.0);

        CombinationRecord {
            result_symbol: HYBRID_GLYPHS.choose(rng).copied().unwrap_or("⟡").to_string(),
            name: format!("{} {}", word, suffix),
            properties,
            potency: round_to(potency, 2),
            stability: round_to(stability, 2),
            entropy_cost: round_to(entropy_cost, 2),
        }
    }

    fn record_history(&mut self, resolution: Resolution) {
        self.transmutations += 1;
        self.history.push(resolution);
        if self.history.len() > self.history_capacity {
            let excess = self.history.len() - self.history_capacity / 2;
            self.history.drain(..excess);
        }
    }

    pub fn mastery_info(&self) -> MasteryInfo {
        let discovery_rate = if self.transmutations == 0 {
            0.0
        } else {
            let discoveries = self.history.iter().filter(|r| r.is_discovery()).count();
            round_to(discoveries as f64 / self.transmutations as f64 * 100.0, 1)
        };

        MasteryInfo {
            level: round_to(self.mastery, 2),
            transmutations: self.transmutations,
            known_patterns: self.known.len(),
            discovery_rate,
            next_level_progress: round_to((self.mastery % 1.0) * 100.0, 1),
        }
    }

    /// Copies the registry contents for persistence.
    pub fn export_state(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            combinations: self.known.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            mastery_level: self.mastery,
            transmutations: self.transmutations,
            history: self.history.clone(),
        }
    }

    /// Checks a snapshot without applying it.
    pub fn validate_snapshot(snapshot: &RegistrySnapshot) -> Result<(), DriftError> {
        if snapshot.mastery_level.is_nan() || snapshot.mastery_level < 0.0 {
            return Err(DriftError::corrupt("mastery_level must be non-negative"));
        }
        if let Some((key, _)) = snapshot.combinations.iter().find(|(_, r)| !r.in_bounds()) {
            return Err(DriftError::corrupt(format!("combination {} out of range", key)));
        }
        Ok(())
    }

    /// Replaces the registry contents with a validated snapshot.
    pub fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.known = snapshot.combinations.into_iter().collect();
        self.mastery = snapshot.mastery_level.min(self.mastery_ceiling);
        self.transmutations = snapshot.transmutations;
        self.history = snapshot.history;
    }
}

/// Builds the failure sentinel.
fn failure<R: Rng + ?Sized>(branch: Branch, rng: &mut R) -> Outcome {
    let name = FAILURE_NAMES.choose(rng).copied().unwrap_or("Resonance Collapse");
    let effect = FailureEffect::ALL
        .choose(rng)
        .copied()
        .unwrap_or(FailureEffect::GlyphScatter);

    Outcome::Failure {
        branch,
        record: CombinationRecord::new(FAILURE_GLYPH, name, &["unstable", "dangerous"], 0.0, 0.0, 0.05),
        effect,
    }
}
