use super::direction::{Direction, DirectionSlots};
use super::profile::ProfileEntry;
use super::utils::fs::write_json_pretty;
use crate::core::models::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to persist checkpoint '{path}': {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },
}

/// Reaction-path progress recorded for one direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionCheckpoint {
    pub completed: bool,
    pub step: Option<u64>,
    pub last_geometry: Option<Geometry>,
    pub last_xyz: Option<PathBuf>,
    pub steps_xyz: Option<PathBuf>,
}

/// SCF bookkeeping merged into the checkpoint after an energy evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScfCheckpoint {
    pub chkfile: Option<PathBuf>,
    pub energy: Option<f64>,
    pub converged: Option<bool>,
}

/// The durable progress record of a run.
///
/// Serialized as one flat JSON document. Keys this version does not know
/// about are kept in [`CheckpointRecord::extra`] and written back unchanged,
/// so records produced by other stages survive a load-modify-persist cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckpointWire", into = "CheckpointWire")]
pub struct CheckpointRecord {
    pub version: u32,
    pub last_stage: Option<String>,
    pub last_step: Option<u64>,
    pub last_step_stage: Option<String>,
    pub last_step_direction: Option<Direction>,
    pub last_geometry: Option<Geometry>,
    pub last_geometry_xyz: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub irc_direction: Option<Direction>,
    pub irc: DirectionSlots<DirectionCheckpoint>,
    pub irc_profile: Vec<ProfileEntry>,
    pub scf: ScfCheckpoint,
    pub extra: Map<String, Value>,
}

impl CheckpointRecord {
    pub fn new() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::new() || *self == Self::default()
    }

    pub fn direction(&self, direction: Direction) -> &DirectionCheckpoint {
        &self.irc[direction]
    }

    pub fn direction_mut(&mut self, direction: Direction) -> &mut DirectionCheckpoint {
        &mut self.irc[direction]
    }
}

/// Loads the checkpoint at `path`.
///
/// A missing, unreadable, or malformed file yields an empty record: stale
/// state degrades to a cold start instead of aborting the run.
pub fn load_checkpoint(path: &Path) -> CheckpointRecord {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No readable checkpoint; starting cold.");
            return CheckpointRecord::new();
        }
    };
    match serde_json::from_str::<CheckpointRecord>(&content) {
        Ok(record) => {
            if record.version > CHECKPOINT_VERSION {
                warn!(
                    path = %path.display(),
                    found = record.version,
                    supported = CHECKPOINT_VERSION,
                    "Checkpoint was written by a newer version; unknown keys will be preserved."
                );
            }
            record
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unparseable checkpoint.");
            CheckpointRecord::new()
        }
    }
}

/// Replaces the checkpoint at `path` with the full `record`.
pub fn persist_checkpoint(path: &Path, record: &CheckpointRecord) -> Result<(), CheckpointError> {
    write_json_pretty(path, record).map_err(|e| CheckpointError::Persist {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Owns the checkpoint location of a run; a store without a path is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    path: Option<PathBuf>,
}

impl CheckpointStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> CheckpointRecord {
        match &self.path {
            Some(path) => load_checkpoint(path),
            None => CheckpointRecord::new(),
        }
    }

    pub fn persist(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        match &self.path {
            Some(path) => persist_checkpoint(path, record),
            None => Ok(()),
        }
    }

    /// Merges SCF results into whatever is currently stored and persists it.
    pub fn update_scf(&self, scf: &ScfCheckpoint) -> Result<(), CheckpointError> {
        if self.path.is_none() {
            return Ok(());
        }
        let mut record = self.load();
        if scf.chkfile.is_some() {
            record.scf.chkfile = scf.chkfile.clone();
        }
        record.scf.energy = scf.energy;
        record.scf.converged = scf.converged;
        self.persist(&record)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointWire {
    #[serde(default)]
    checkpoint_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_step: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_step_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_step_direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_geometry_xyz: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snapshot_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_direction: Option<Direction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_forward_completed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_forward_step: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_forward_last_geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_forward_last_xyz: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_forward_steps_xyz: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_reverse_completed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_reverse_step: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_reverse_last_geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_reverse_last_xyz: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    irc_reverse_steps_xyz: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    irc_profile: Vec<ProfileEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    scf_chkfile: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scf_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scf_converged: Option<bool>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Accepts non-negative integers, integral floats, and numeric strings.
fn parse_step(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Null) | None => false,
    }
}

impl From<CheckpointWire> for CheckpointRecord {
    fn from(wire: CheckpointWire) -> Self {
        let forward = DirectionCheckpoint {
            completed: is_truthy(wire.irc_forward_completed.as_ref()),
            step: parse_step(wire.irc_forward_step.as_ref()),
            last_geometry: wire.irc_forward_last_geometry,
            last_xyz: wire.irc_forward_last_xyz,
            steps_xyz: wire.irc_forward_steps_xyz,
        };
        let reverse = DirectionCheckpoint {
            completed: is_truthy(wire.irc_reverse_completed.as_ref()),
            step: parse_step(wire.irc_reverse_step.as_ref()),
            last_geometry: wire.irc_reverse_last_geometry,
            last_xyz: wire.irc_reverse_last_xyz,
            steps_xyz: wire.irc_reverse_steps_xyz,
        };
        Self {
            version: wire.checkpoint_version.unwrap_or(CHECKPOINT_VERSION),
            last_stage: wire.last_stage,
            last_step: parse_step(wire.last_step.as_ref()),
            last_step_stage: wire.last_step_stage,
            last_step_direction: wire.last_step_direction,
            last_geometry: wire.last_geometry,
            last_geometry_xyz: wire.last_geometry_xyz,
            snapshot_dir: wire.snapshot_dir,
            irc_direction: wire.irc_direction,
            irc: DirectionSlots::new(forward, reverse),
            irc_profile: wire.irc_profile,
            scf: ScfCheckpoint {
                chkfile: wire.scf_chkfile,
                energy: wire.scf_energy,
                converged: wire.scf_converged,
            },
            extra: wire.extra,
        }
    }
}

impl From<CheckpointRecord> for CheckpointWire {
    fn from(record: CheckpointRecord) -> Self {
        let forward = record.irc[Direction::Forward].clone();
        let reverse = record.irc[Direction::Reverse].clone();
        let completed = |c: bool| c.then_some(Value::Bool(true));
        let step = |s: Option<u64>| s.map(Value::from);
        Self {
            checkpoint_version: Some(CHECKPOINT_VERSION.max(record.version)),
            last_stage: record.last_stage,
            last_step: step(record.last_step),
            last_step_stage: record.last_step_stage,
            last_step_direction: record.last_step_direction,
            last_geometry: record.last_geometry,
            last_geometry_xyz: record.last_geometry_xyz,
            snapshot_dir: record.snapshot_dir,
            irc_direction: record.irc_direction,
            irc_forward_completed: completed(forward.completed),
            irc_forward_step: step(forward.step),
            irc_forward_last_geometry: forward.last_geometry,
            irc_forward_last_xyz: forward.last_xyz,
            irc_forward_steps_xyz: forward.steps_xyz,
            irc_reverse_completed: completed(reverse.completed),
            irc_reverse_step: step(reverse.step),
            irc_reverse_last_geometry: reverse.last_geometry,
            irc_reverse_last_xyz: reverse.last_xyz,
            irc_reverse_steps_xyz: reverse.steps_xyz,
            irc_profile: record.irc_profile,
            scf_chkfile: record.scf.chkfile,
            scf_energy: record.scf.energy,
            scf_converged: record.scf.converged,
            extra: record.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::geometry::Atom;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn geometry() -> Geometry {
        Geometry::new(vec![Atom::new("H", Point3::new(0.0, 0.0, 0.74))])
    }

    #[test]
    fn missing_file_loads_as_empty_record() {
        let dir = tempdir().unwrap();
        let record = load_checkpoint(&dir.path().join("checkpoint.json"));
        assert!(record.is_empty());
        assert_eq!(record.version, CHECKPOINT_VERSION);
    }

    #[test]
    fn corrupt_file_loads_as_empty_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(&path, "{\"last_stage\": \"irc\", ").unwrap();
        assert!(load_checkpoint(&path).is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(load_checkpoint(&path).is_empty());
    }

    #[test]
    fn persist_then_load_round_trips_direction_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let mut record = CheckpointRecord::new();
        record.last_stage = Some("irc".to_string());
        record.direction_mut(Direction::Forward).completed = true;
        record.direction_mut(Direction::Forward).step = Some(10);
        record.direction_mut(Direction::Reverse).step = Some(7);
        record.direction_mut(Direction::Reverse).last_geometry = Some(geometry());

        persist_checkpoint(&path, &record).unwrap();
        let loaded = load_checkpoint(&path);

        assert_eq!(loaded, record);
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["irc_forward_completed"], Value::Bool(true));
        assert_eq!(raw["irc_forward_step"], 10);
        assert_eq!(raw["irc_reverse_step"], 7);
        assert!(raw.get("irc_reverse_completed").is_none());
    }

    #[test]
    fn unknown_keys_survive_load_and_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(
            &path,
            r#"{"last_stage": "optimization", "opt_cycle": 42, "custom": {"a": [1, 2]}}"#,
        )
        .unwrap();

        let mut record = load_checkpoint(&path);
        assert_eq!(record.last_stage.as_deref(), Some("optimization"));
        record.last_stage = Some("irc".to_string());
        persist_checkpoint(&path, &record).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["opt_cycle"], 42);
        assert_eq!(raw["custom"]["a"][1], 2);
        assert_eq!(raw["last_stage"], "irc");
    }

    #[test]
    fn lenient_step_values_are_parsed_or_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(
            &path,
            r#"{"irc_forward_step": "5", "irc_reverse_step": -3, "last_step": 2.0, "irc_forward_completed": 1}"#,
        )
        .unwrap();

        let record = load_checkpoint(&path);
        assert_eq!(record.direction(Direction::Forward).step, Some(5));
        assert_eq!(record.direction(Direction::Reverse).step, None);
        assert_eq!(record.last_step, Some(2));
        assert!(record.direction(Direction::Forward).completed);
    }

    #[test]
    fn store_without_path_is_a_no_op() {
        let store = CheckpointStore::default();
        assert!(store.path().is_none());
        store.persist(&CheckpointRecord::new()).unwrap();
        store.update_scf(&ScfCheckpoint::default()).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn scf_update_merges_into_existing_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let store = CheckpointStore::new(Some(path.clone()));
        let mut record = CheckpointRecord::new();
        record.direction_mut(Direction::Reverse).step = Some(3);
        store.persist(&record).unwrap();

        store
            .update_scf(&ScfCheckpoint {
                chkfile: Some(PathBuf::from("scf.chk")),
                energy: Some(-76.4),
                converged: Some(true),
            })
            .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.direction(Direction::Reverse).step, Some(3));
        assert_eq!(loaded.scf.energy, Some(-76.4));
        assert_eq!(loaded.scf.chkfile, Some(PathBuf::from("scf.chk")));
    }
}
