//! Persisted snapshots and the store that reads and writes them.

use crate::error::DriftError;
use crate::field::EntropyField;
use crate::ledger::ResourceLedger;
use crate::records::{AnomalyEcho, OperationRecord, SentientLog};
use crate::registry::{CombinationRegistry, RegistrySnapshot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Point-in-time copy of a coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node_id: String,
    /// Wall-clock time of export (ms since Unix epoch)
    pub saved_ms: u64,
    pub entropy_field: EntropyField,
    pub ledger: ResourceLedger,
    pub operation_log: Vec<OperationRecord>,
    pub echo_log: Vec<AnomalyEcho>,
    #[serde(default)]
    pub wipe_history: Vec<OperationRecord>,
    #[serde(default)]
    pub sentient_logs: Vec<SentientLog>,
    pub registry: RegistrySnapshot,
    #[serde(default)]
    pub next_sequence: u64,
}

impl Snapshot {
    /// Checks every bounded scalar the snapshot carries.
    pub fn validate(&self) -> Result<(), DriftError> {
        if let Some(violation) = self.entropy_field.bounds_violation() {
            return Err(DriftError::corrupt(violation));
        }
        if let Some(record) = self
            .operation_log
            .iter()
            .chain(&self.wipe_history)
            .find(|r| !(0.0..=1.0).contains(&r.global_flux))
        {
            return Err(DriftError::corrupt(format!(
                "operation {} records flux {}",
                record.sequence, record.global_flux
            )));
        }
        if let Some(echo) = self.echo_log.iter().find(|e| {
            !(0.0..=1.0).contains(&e.entropy_signature)
                || !(0.0..=1.0).contains(&e.strength)
                || !(-0.5..=0.5).contains(&e.temporal_drift)
        }) {
            return Err(DriftError::corrupt(format!("echo {} out of range", echo.id)));
        }
        if let Some(log) = self.sentient_logs.iter().find(|l| {
            !(0.1..=0.8).contains(&l.sentience_level) || !(0.0..=0.5).contains(&l.autonomy_level)
        }) {
            return Err(DriftError::corrupt(format!(
                "sentient log {} out of range",
                log.log_id
            )));
        }
        CombinationRegistry::validate_snapshot(&self.registry)
    }
}

/// Storage backend for snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Loads the stored snapshot; `Ok(None)` on first run.
    fn load(&self) -> Result<Option<Snapshot>, DriftError>;

    /// Replaces the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), DriftError>;
}

/// Single-file JSON store.
///
/// Saves go to a sibling `.tmp` file that is then renamed over the target,
/// so a reader never sees a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, DriftError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_str(&text)?;
        snapshot.validate()?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), DriftError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| DriftError::Persistence(e.to_string()))?;
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "Snapshot saved");
        Ok(())
    }
}
