//! Run-level metadata and its terminal write.
//!
//! [`RunMetadata`] accumulates what each stage reports about itself during a
//! run. [`MetadataFinalizer`] owns the last write: it stamps the terminal
//! status, writes the metadata document and one event-log line, and notifies
//! the external run queue. `finalize` consumes the finalizer, so a run can
//! reach a terminal status at most once.

use super::context::RunPaths;
use super::error::{EngineError, failure_trace};
use super::utils::fs::write_json_pretty;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a downstream stage that has not produced its own payload yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: String,
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Single-point refinement result as recorded in the run metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinglePointRecord {
    pub status: String,
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispersion_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiling: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub elapsed_seconds: f64,
    pub n_steps: Option<u64>,
    pub final_energy: Option<f64>,
    pub opt_final_energy: Option<f64>,
    pub final_sp_energy: Option<f64>,
    pub final_sp_converged: Option<bool>,
    pub final_sp_cycles: Option<u32>,
    pub scf_converged: Option<bool>,
    pub opt_converged: Option<bool>,
    pub converged: bool,
    pub memory_limit_enforced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispersion_info: Option<Value>,
    /// The gating record, replaced by the full IRC payload once the trace runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_point: Option<SinglePointRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiling: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunMetadata {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            ..Default::default()
        }
    }

    /// Files a stage's profiling data under `profiling.<stage>`.
    pub fn record_profiling(&mut self, stage: &str, profiling: Value) {
        let slot = self
            .profiling
            .get_or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            map.insert(stage.to_string(), profiling);
        }
    }

    /// Reads a metadata document written by an earlier stage of the same run.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// The argument bundle handed to the run queue on every status transition.
#[derive(Debug, Clone, Copy)]
pub struct QueueUpdate<'a> {
    pub run_metadata_path: &'a Path,
    pub event_log_path: &'a Path,
    pub run_id: &'a str,
    pub run_dir: &'a Path,
    pub metadata: &'a RunMetadata,
    pub status: RunStatus,
    pub previous_status: Option<RunStatus>,
    pub exit_code: Option<i32>,
    pub details: Option<&'a Value>,
    pub error: Option<&'a str>,
}

pub type QueueError = Box<dyn std::error::Error + Send + Sync>;

/// External observer of run status transitions.
pub trait RunQueue {
    fn record_status(&self, update: &QueueUpdate<'_>) -> Result<(), QueueError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueue;

impl RunQueue for NoopQueue {
    fn record_status(&self, _update: &QueueUpdate<'_>) -> Result<(), QueueError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    run_id: &'a str,
    status: RunStatus,
    previous_status: Option<RunStatus>,
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome<'e> {
    Completed,
    Failed {
        error: &'e (dyn std::error::Error + 'static),
        details: Option<Value>,
    },
}

pub struct MetadataFinalizer<'q> {
    paths: RunPaths,
    run_id: String,
    queue: &'q dyn RunQueue,
    finalized: bool,
}

impl<'q> MetadataFinalizer<'q> {
    pub fn new(paths: RunPaths, run_id: impl Into<String>, queue: &'q dyn RunQueue) -> Self {
        Self {
            paths,
            run_id: run_id.into(),
            queue,
            finalized: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Records the run as running. Not terminal; may precede `finalize`.
    pub fn mark_running(&self, metadata: &mut RunMetadata) -> Result<(), EngineError> {
        let previous = metadata.status;
        metadata.status = Some(RunStatus::Running);
        self.publish(metadata, RunStatus::Running, previous, None, None, None)
    }

    /// Writes the terminal status. Returns the final metadata document.
    pub fn finalize(
        mut self,
        mut metadata: RunMetadata,
        outcome: RunOutcome<'_>,
    ) -> Result<RunMetadata, EngineError> {
        self.finalized = true;
        let previous = metadata.status;
        metadata.run_id.get_or_insert_with(|| self.run_id.clone());

        let (status, exit_code, details) = match outcome {
            RunOutcome::Completed => (RunStatus::Completed, 0, None),
            RunOutcome::Failed { error, details } => {
                let message = error.to_string();
                let details = details.or_else(|| Some(serde_json::json!({ "error": message })));
                metadata.error = Some(message);
                metadata.trace = Some(failure_trace(error));
                (RunStatus::Failed, 1, details)
            }
        };
        metadata.status = Some(status);
        metadata.exit_code = Some(exit_code);
        metadata.details = details.clone();

        let error = metadata.error.clone();
        self.publish(
            &metadata,
            status,
            previous,
            Some(exit_code),
            details.as_ref(),
            error.as_deref(),
        )?;
        info!(run_id = %self.run_id, status = %status, exit_code, "Run finalized.");
        Ok(metadata)
    }

    fn publish(
        &self,
        metadata: &RunMetadata,
        status: RunStatus,
        previous_status: Option<RunStatus>,
        exit_code: Option<i32>,
        details: Option<&Value>,
        error: Option<&str>,
    ) -> Result<(), EngineError> {
        let metadata_path = &self.paths.run_metadata_path;
        write_json_pretty(metadata_path, metadata).map_err(|e| EngineError::io(metadata_path, e))?;

        let event = EventRecord {
            timestamp: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
            status,
            previous_status,
            exit_code,
            details,
            error,
        };
        self.append_event(&event)?;

        let update = QueueUpdate {
            run_metadata_path: metadata_path,
            event_log_path: &self.paths.event_log_path,
            run_id: &self.run_id,
            run_dir: &self.paths.run_dir,
            metadata,
            status,
            previous_status,
            exit_code,
            details,
            error,
        };
        if let Err(e) = self.queue.record_status(&update) {
            warn!(run_id = %self.run_id, status = %status, error = %e, "Run queue update failed.");
        }
        Ok(())
    }

    fn append_event(&self, event: &EventRecord<'_>) -> Result<(), EngineError> {
        let path = &self.paths.event_log_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| EngineError::io(path, e))
    }
}

impl Drop for MetadataFinalizer<'_> {
    fn drop(&mut self) {
        if !self.finalized && !std::thread::panicking() {
            warn!(run_id = %self.run_id, "Run finalizer dropped without a terminal status.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingQueue {
        statuses: RefCell<Vec<(RunStatus, Option<RunStatus>, Option<i32>)>>,
    }

    impl RunQueue for RecordingQueue {
        fn record_status(&self, update: &QueueUpdate<'_>) -> Result<(), QueueError> {
            self.statuses
                .borrow_mut()
                .push((update.status, update.previous_status, update.exit_code));
            Ok(())
        }
    }

    struct FailingQueue;

    impl RunQueue for FailingQueue {
        fn record_status(&self, _update: &QueueUpdate<'_>) -> Result<(), QueueError> {
            Err("queue offline".into())
        }
    }

    #[test]
    fn completed_finalize_writes_metadata_event_and_notifies_queue() {
        let dir = tempdir().unwrap();
        let paths = RunPaths::in_run_dir(dir.path());
        let queue = RecordingQueue::default();
        let finalizer = MetadataFinalizer::new(paths.clone(), "run-1", &queue);

        let mut metadata = RunMetadata::new("run-1");
        finalizer.mark_running(&mut metadata).unwrap();
        let metadata = finalizer.finalize(metadata, RunOutcome::Completed).unwrap();

        assert_eq!(metadata.status, Some(RunStatus::Completed));
        assert_eq!(metadata.exit_code, Some(0));
        let on_disk = RunMetadata::load(&paths.run_metadata_path).unwrap();
        assert_eq!(on_disk, metadata);

        let events = fs::read_to_string(&paths.event_log_path).unwrap();
        assert_eq!(events.lines().count(), 2);
        let last: Value = serde_json::from_str(events.lines().last().unwrap()).unwrap();
        assert_eq!(last["status"], "completed");
        assert_eq!(last["previous_status"], "running");

        assert_eq!(
            *queue.statuses.borrow(),
            vec![
                (RunStatus::Running, None, None),
                (RunStatus::Completed, Some(RunStatus::Running), Some(0)),
            ]
        );
    }

    #[test]
    fn failed_finalize_records_error_and_trace() {
        let dir = tempdir().unwrap();
        let paths = RunPaths::in_run_dir(dir.path());
        let finalizer = MetadataFinalizer::new(paths, "run-2", &NoopQueue);
        let error = EngineError::backend("frequency", "hessian unavailable");

        let metadata = finalizer
            .finalize(
                RunMetadata::new("run-2"),
                RunOutcome::Failed {
                    error: &error,
                    details: None,
                },
            )
            .unwrap();

        assert_eq!(metadata.status, Some(RunStatus::Failed));
        assert_eq!(metadata.exit_code, Some(1));
        assert_eq!(
            metadata.error.as_deref(),
            Some("Backend failed during frequency: hessian unavailable")
        );
        assert_eq!(metadata.trace.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            metadata.details.as_ref().and_then(|d| d["error"].as_str()),
            metadata.error.as_deref()
        );
    }

    #[test]
    fn queue_failure_does_not_fail_finalize() {
        let dir = tempdir().unwrap();
        let finalizer = MetadataFinalizer::new(RunPaths::in_run_dir(dir.path()), "run-3", &FailingQueue);
        assert!(
            finalizer
                .finalize(RunMetadata::new("run-3"), RunOutcome::Completed)
                .is_ok()
        );
    }

    #[test]
    fn profiling_is_filed_per_stage() {
        let mut metadata = RunMetadata::new("r");
        metadata.record_profiling("frequency", serde_json::json!({"wall_s": 1.5}));
        metadata.record_profiling("irc", serde_json::json!({"wall_s": 9.0}));
        let profiling = metadata.profiling.unwrap();
        assert_eq!(profiling["frequency"]["wall_s"], 1.5);
        assert_eq!(profiling["irc"]["wall_s"], 9.0);
    }

    #[test]
    fn unknown_metadata_keys_round_trip() {
        let raw = r#"{"run_id":"r","status":"running","optimizer":{"steps":12}}"#;
        let metadata: RunMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.extra["optimizer"]["steps"], 12);
        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["optimizer"]["steps"], 12);
    }
}
