//! Operation records, anomaly echoes and the other values the coordinator
//! appends to its logs.
//!
//! Records are tagged by operation kind and carry only the fields that kind
//! produces. Once appended they are never mutated.

use crate::error::DriftError;
use crate::fracture::fracture;
use crate::glyphs::Element;
use crate::ledger::ResourceDelta;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Node lifecycle operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Fork,
    Collapse,
    MemoryWipe,
    Scan,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Fork => "fork",
            OperationKind::Collapse => "collapse",
            OperationKind::MemoryWipe => "memory_wipe",
            OperationKind::Scan => "scan",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Advisory alchemical reading of a forked node id.
///
/// Reported to callers only; it never feeds back into the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlchemicalPotential {
    /// Distinct-character ratio of the node id
    pub pattern_strength: f64,
    pub resonance_potential: f64,
    pub stability_bias: f64,
    pub elemental_inclination: Option<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkPayload {
    pub node_id: String,
    pub parent_node: String,
    pub glyph_state: Vec<String>,
    /// Global flux observed before the fork's shift
    pub entropy_level: f64,
    pub alchemy_potential: AlchemicalPotential,
    pub sentience_probability: f64,
    /// Id of the sentient log spawned by this fork, if any
    pub sentient_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapsePayload {
    pub node_id: String,
    pub sigil: String,
    pub entropy_release: f64,
    pub time_salt_generated: u64,
    pub fragments_released: u64,
    pub echo_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipePayload {
    pub operations_wiped: usize,
    pub time_salt_generated: u64,
    pub fractured_echoes: Vec<Uuid>,
}

/// Kind-specific part of an operation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    Fork(ForkPayload),
    Collapse(CollapsePayload),
    MemoryWipe(WipePayload),
}

/// One entry of the append-only operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Monotonic sequence number within the simulation
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// Ledger change caused by this operation
    pub resources: ResourceDelta,
    /// Global flux after the operation committed
    pub global_flux: f64,
    pub payload: OperationPayload,
}

impl OperationRecord {
    pub fn kind(&self) -> OperationKind {
        match self.payload {
            OperationPayload::Fork(_) => OperationKind::Fork,
            OperationPayload::Collapse(_) => OperationKind::Collapse,
            OperationPayload::MemoryWipe(_) => OperationKind::MemoryWipe,
        }
    }

    /// Node id the operation acted on (none for wipes).
    pub fn node_id(&self) -> Option<&str> {
        match &self.payload {
            OperationPayload::Fork(fork) => Some(&fork.node_id),
            OperationPayload::Collapse(collapse) => Some(&collapse.node_id),
            OperationPayload::MemoryWipe(_) => None,
        }
    }

    /// The record as a single-level object: envelope fields with the
    /// payload's fields (and its `kind` tag) merged alongside.
    pub fn flat_view(&self) -> Result<Value, DriftError> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            other => return Ok(other),
        };
        if let Some(Value::Object(payload)) = fields.remove("payload") {
            fields.extend(payload);
        }
        Ok(Value::Object(fields))
    }
}

/// Payload of an echo: a verbatim copy or a fractured one, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoData {
    SourceData(Value),
    CorruptedData(Value),
}

/// Residue of an operation, kept after the operation itself may be gone.
///
/// The stored copy is the record's flat view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEcho {
    pub id: Uuid,
    pub timestamp_ms: u64,
    pub source_kind: OperationKind,
    pub entropy_signature: f64,
    pub temporal_drift: f64,
    pub strength: f64,
    pub data: EchoData,
}

impl AnomalyEcho {
    /// Captures an echo of `record` under `id`.
    ///
    /// With `fracture_probability = Some(p)` the stored copy is fractured
    /// at per-field probability `p`; with `None` it is verbatim.
    pub fn capture<R: Rng + ?Sized>(
        id: Uuid,
        record: &OperationRecord,
        timestamp_ms: u64,
        fracture_probability: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, DriftError> {
        let source = record.flat_view()?;
        let data = match fracture_probability {
            Some(p) => EchoData::CorruptedData(fracture(&source, p, rng)),
            None => EchoData::SourceData(source),
        };

        Ok(Self {
            id,
            timestamp_ms,
            source_kind: record.kind(),
            entropy_signature: round_to(rng.gen_range(0.0..=1.0), 3),
            temporal_drift: rng.gen_range(-0.5..=0.5),
            strength: rng.gen_range(0.1..=0.9),
            data,
        })
    }

    pub fn fractured(&self) -> bool {
        matches!(self.data, EchoData::CorruptedData(_))
    }

    /// The stored copy, whichever form it has.
    pub fn payload(&self) -> &Value {
        match &self.data {
            EchoData::SourceData(v) | EchoData::CorruptedData(v) => v,
        }
    }
}

/// Behavior archetype of a sentient log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentientBehavior {
    Observer,
    Manipulator,
    Chronicler,
    Prophet,
}

impl SentientBehavior {
    pub const ALL: [SentientBehavior; 4] = [
        SentientBehavior::Observer,
        SentientBehavior::Manipulator,
        SentientBehavior::Chronicler,
        SentientBehavior::Prophet,
    ];
}

/// Marker left by a fork that crossed the sentience threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentientLog {
    pub log_id: String,
    pub origin: String,
    pub created_ms: u64,
    pub sentience_level: f64,
    pub autonomy_level: f64,
    pub behavior: SentientBehavior,
}

/// Weighted-random glyph grid produced by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMap {
    pub rows: Vec<Vec<String>>,
}

impl DriftMap {
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Iterates every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}

impl std::fmt::Display for DriftMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}

/// Builds a v4 uuid from the injected random source.
pub fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

/// Rounds to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
