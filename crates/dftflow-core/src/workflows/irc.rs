//! Reaction-path (IRC) stage.
//!
//! The trace itself is delegated to the backend. This module owns what
//! happens around it: rebuilding the resume state from a checkpoint,
//! recording each evaluated step exactly once, throttling snapshot and
//! checkpoint writes, and publishing the payload and per-step export once the
//! trace returns.

use super::single_point::{self, SinglePointOutcome};
use crate::core::io::traits::MolecularFile;
use crate::core::io::xyz::{XyzFile, format_xyz_comment};
use crate::core::models::geometry::Geometry;
use crate::engine::backend::{
    ComputeBackend, DirectionResume, ImaginaryMode, IrcRequest, PathObserver, ResumePoint,
    ResumeState, StepEvent,
};
use crate::engine::cadence::SnapshotCadence;
use crate::engine::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::engine::config::IrcSettings;
use crate::engine::context::StageContext;
use crate::engine::direction::{Direction, DirectionSlots};
use crate::engine::error::EngineError;
use crate::engine::metadata::{MetadataFinalizer, RunMetadata, RunOutcome, RunSummary};
use crate::engine::profile::{
    ProfileAssessment, ProfileCache, ProfileEntry, assess_profile, write_profile_csv,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{StageEvent, StageState};
use crate::engine::utils::fs::write_json_pretty;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

pub(crate) const STAGE: &str = "irc";

/// The reaction-path payload document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrcPayload {
    pub status: String,
    pub output_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_xyz: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_xyz: Option<PathBuf>,
    pub steps: u32,
    pub step_size: f64,
    pub force_threshold: f64,
    pub mode_eigenvalue: Option<f64>,
    pub profile: Vec<ProfileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_csv_file: Option<PathBuf>,
    pub profiling: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<ProfileAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

impl IrcPayload {
    /// A payload for a trace that did not get to produce a profile.
    pub fn failed(context: &StageContext, settings: IrcSettings, error: &EngineError) -> Self {
        Self {
            status: StageState::Failed(error.to_string()).label().to_string(),
            output_file: context.paths.irc_output_path.clone(),
            forward_xyz: None,
            reverse_xyz: None,
            steps: settings.steps,
            step_size: settings.step_size,
            force_threshold: settings.force_threshold,
            mode_eigenvalue: None,
            profile: Vec::new(),
            profile_csv_file: None,
            profiling: None,
            assessment: None,
            error: Some(error.to_string()),
            trace: Some(crate::engine::error::failure_trace(error)),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DirectionProgress {
    step: Option<u64>,
    geometry: Option<Geometry>,
}

/// Observes the backend's integration and keeps the checkpoint current.
pub(crate) struct IrcRecorder<'a> {
    context: &'a StageContext,
    store: &'a CheckpointStore,
    reporter: &'a ProgressReporter<'a>,
    checkpoint: CheckpointRecord,
    profile: ProfileCache,
    cadence: SnapshotCadence,
    progress: DirectionSlots<DirectionProgress>,
}

impl<'a> IrcRecorder<'a> {
    /// Loads the checkpoint and, when resuming, seeds the profile and cadence from it.
    pub(crate) fn new(
        context: &'a StageContext,
        store: &'a CheckpointStore,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        let checkpoint = store.load();
        let profile = if context.resume_dir.is_some() {
            ProfileCache::from_entries(checkpoint.irc_profile.iter().copied())
        } else {
            ProfileCache::new()
        };
        Self {
            context,
            store,
            reporter,
            checkpoint,
            profile,
            cadence: SnapshotCadence::new(context.snapshots),
            progress: DirectionSlots::default(),
        }
    }

    /// Reconstructs what the integrator needs to skip or continue each direction.
    ///
    /// Empty unless the run resumes from a non-empty checkpoint.
    pub(crate) fn resume_state(&mut self) -> Result<ResumeState, EngineError> {
        let mut state = ResumeState::default();
        if self.context.resume_dir.is_none() || self.checkpoint.is_empty() {
            return Ok(state);
        }

        for direction in Direction::ALL {
            let saved = self.checkpoint.direction(direction).clone();
            if let Some(step) = saved.step {
                self.cadence.seed(direction, step);
            }
            state[direction] = DirectionResume {
                completed: saved.completed,
                point: self.resume_point(direction, saved.step, saved.last_xyz, saved.last_geometry)?,
            };
            debug!(
                direction = %direction,
                completed = state[direction].completed,
                step = ?saved.step,
                "Reconstructed resume point."
            );
        }
        Ok(state)
    }

    /// A snapshot that still exists wins; the raw checkpoint geometry is only
    /// materialized when the step it belongs to is known.
    fn resume_point(
        &self,
        direction: Direction,
        step: Option<u64>,
        last_xyz: Option<PathBuf>,
        last_geometry: Option<Geometry>,
    ) -> Result<Option<ResumePoint>, EngineError> {
        if let Some(xyz) = last_xyz.map(|p| self.context.paths.resolve(p)) {
            if xyz.exists() {
                return Ok(Some(ResumePoint { step, xyz }));
            }
            warn!(direction = %direction, path = %xyz.display(), "Checkpointed snapshot is missing.");
        }
        let (Some(step), Some(geometry)) = (step, last_geometry) else {
            return Ok(None);
        };
        let xyz = self.context.paths.irc_resume_geometry(direction);
        let comment = format_xyz_comment(
            self.context.charge_spin,
            Some(&format!("resume=checkpoint direction={}", direction)),
        );
        XyzFile::write_to_path(&geometry, &comment, &xyz)?;
        Ok(Some(ResumePoint {
            step: Some(step),
            xyz,
        }))
    }

    pub(crate) fn profile(&self) -> &[ProfileEntry] {
        self.profile.entries()
    }

    fn write_snapshot(
        &self,
        direction: Direction,
        step: u64,
        geometry: &Geometry,
        series: bool,
    ) -> Result<(), EngineError> {
        let paths = &self.context.paths;
        let snapshot_dir = paths.snapshot_dir();
        fs::create_dir_all(&snapshot_dir).map_err(|e| EngineError::io(&snapshot_dir, e))?;
        let comment = format_xyz_comment(
            self.context.charge_spin,
            Some(&format!("step={} direction={}", step, direction)),
        );
        if series {
            XyzFile::append_to_path(geometry, &comment, paths.irc_steps_snapshot(direction))?;
        }
        XyzFile::write_to_path(geometry, &comment, paths.irc_last_snapshot(direction))?;
        Ok(())
    }

    /// Applies the position fields shared by step and completion updates.
    fn record_position(&mut self, direction: Direction, step: u64, geometry: &Geometry) {
        let paths = &self.context.paths;
        let snapshots = self.context.snapshots;
        let record = &mut self.checkpoint;

        record.last_stage = Some(STAGE.to_string());
        record.last_step = Some(step);
        record.last_step_stage = Some(STAGE.to_string());
        record.last_step_direction = Some(direction);
        record.last_geometry = Some(geometry.clone());
        record.snapshot_dir = Some(paths.snapshot_dir());
        record.irc_direction = Some(direction);
        record.irc[direction].last_geometry = Some(geometry.clone());

        for d in Direction::ALL {
            record.irc[d].steps_xyz = snapshots
                .write_step_series()
                .then(|| paths.irc_steps_snapshot(d));
        }
        if snapshots.write_last() {
            let last = paths.irc_last_snapshot(direction);
            record.last_geometry_xyz = Some(last.clone());
            record.irc[direction].last_xyz = Some(last);
        } else {
            record.last_geometry_xyz = None;
            record.irc[direction].last_xyz = None;
        }
        record.irc_profile = self.profile.entries().to_vec();
    }

    fn persist(&self) -> Result<(), EngineError> {
        Ok(self.store.persist(&self.checkpoint)?)
    }
}

impl PathObserver for IrcRecorder<'_> {
    fn on_step(&mut self, event: StepEvent<'_>) -> Result<(), EngineError> {
        let StepEvent {
            direction, step, geometry, ..
        } = event;
        self.progress[direction] = DirectionProgress {
            step: Some(step),
            geometry: Some(geometry.clone()),
        };
        let appended = self.profile.record(ProfileEntry {
            direction,
            step,
            energy_ev: event.energy_ev,
            energy_hartree: event.energy_hartree,
        });
        if !appended {
            debug!(direction = %direction, step, "Step already recorded; not appending.");
        }

        let decision = self.cadence.decide(direction, step);
        if decision.snapshot {
            self.write_snapshot(
                direction,
                step,
                geometry,
                self.context.snapshots.write_step_series(),
            )?;
        }
        if decision.checkpoint {
            self.record_position(direction, step, geometry);
            self.checkpoint.irc[direction].step = Some(step);
            self.persist()?;
        }

        self.reporter.report(Progress::PathStep {
            direction,
            step,
            energy_ev: event.energy_ev,
        });
        Ok(())
    }

    fn on_direction_complete(
        &mut self,
        direction: Direction,
        step: Option<u64>,
        geometry: Option<&Geometry>,
    ) -> Result<(), EngineError> {
        let cached = std::mem::take(&mut self.progress[direction]);
        let step = cached.step.or(step);
        let geometry = cached.geometry.or_else(|| geometry.cloned());

        if let (Some(step), Some(geometry)) = (step, geometry.as_ref()) {
            if self.context.snapshots.write_last() {
                self.write_snapshot(direction, step, geometry, false)?;
            }
            self.record_position(direction, step, geometry);
        }
        self.checkpoint.irc_profile = self.profile.entries().to_vec();
        let slot = &mut self.checkpoint.irc[direction];
        slot.completed = true;
        if step.is_some() {
            slot.step = step;
        }
        self.persist()?;

        info!(direction = %direction, last_step = ?step, "IRC direction completed.");
        self.reporter.report(Progress::DirectionComplete {
            direction,
            last_step: step,
        });
        Ok(())
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

fn write_payload(path: &Path, payload: &IrcPayload) -> Result<(), EngineError> {
    write_json_pretty(path, payload).map_err(|e| EngineError::io(path, e))
}

/// Runs the trace and publishes its payload, without touching the run status.
///
/// Updates `metadata.irc` and, when profiling is enabled, `metadata.profiling.irc`.
#[instrument(skip_all, name = "irc_trace")]
pub fn trace(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    mode: &ImaginaryMode,
    settings: IrcSettings,
    mode_profiling: Option<Value>,
    metadata: &mut RunMetadata,
    reporter: &ProgressReporter,
) -> Result<IrcPayload, EngineError> {
    reporter.report(Progress::PhaseStart { name: "IRC" });
    info!(
        steps = settings.steps,
        step_size = settings.step_size,
        force_threshold = settings.force_threshold,
        "Starting IRC calculation."
    );
    let state = StageState::NotStarted.transition(STAGE, StageEvent::Start)?;
    let store = CheckpointStore::new(context.paths.checkpoint_path.clone());
    let mut recorder = IrcRecorder::new(context, &store, reporter);
    let resume = recorder.resume_state()?;
    reporter.report(Progress::TaskStart {
        total_steps: 2 * (u64::from(settings.steps) + 1),
    });

    let outcome = backend.reaction_path(
        &IrcRequest {
            context,
            geometry: &context.geometry,
            mode,
            settings,
            resume: &resume,
        },
        &mut recorder,
    )?;
    reporter.report(Progress::TaskFinish);
    let state = state.transition(STAGE, StageEvent::Complete)?;

    let profile = recorder.profile().to_vec();
    let assessment = assess_profile(&profile);
    let paths = &context.paths;
    let profiling = context
        .features
        .profiling
        .then(|| json!({ "mode": mode_profiling, "irc": outcome.profiling }));
    let series = context.snapshots.write_step_series();
    let xyz_for = |direction| {
        if series {
            existing(paths.irc_steps_snapshot(direction))
        } else {
            existing(paths.irc_last_snapshot(direction))
        }
    };

    let payload = IrcPayload {
        status: state.label().to_string(),
        output_file: paths.irc_output_path.clone(),
        forward_xyz: xyz_for(Direction::Forward),
        reverse_xyz: xyz_for(Direction::Reverse),
        steps: settings.steps,
        step_size: settings.step_size,
        force_threshold: settings.force_threshold,
        mode_eigenvalue: Some(mode.eigenvalue),
        profile,
        profile_csv_file: Some(paths.irc_profile_csv_path.clone()),
        profiling,
        assessment: Some(assessment),
        error: None,
        trace: None,
    };
    write_payload(&paths.irc_output_path, &payload)?;
    if let Some(assessment) = &payload.assessment {
        write_profile_csv(&paths.irc_profile_csv_path, &payload.profile, assessment)?;
        info!(
            status = ?assessment.status,
            points = payload.profile.len(),
            "IRC profile assessed: {}",
            assessment.message
        );
    }

    metadata.irc = Some(serde_json::to_value(&payload)?);
    if let Some(profiling) = &payload.profiling {
        metadata.record_profiling(STAGE, profiling.clone());
    }
    reporter.report(Progress::PhaseFinish);
    Ok(payload)
}

/// Records a failed trace: writes the failed payload and updates `metadata.irc`.
pub(crate) fn record_failure(
    context: &StageContext,
    settings: IrcSettings,
    failure: &EngineError,
    metadata: &mut RunMetadata,
) -> IrcPayload {
    let payload = IrcPayload::failed(context, settings, failure);
    if let Err(e) = write_payload(&payload.output_file, &payload) {
        warn!(error = %e, "Could not write failed IRC payload.");
    }
    match serde_json::to_value(&payload) {
        Ok(value) => metadata.irc = Some(value),
        Err(e) => warn!(error = %e, "Could not record failed IRC payload in run metadata."),
    }
    payload
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrcRunResult {
    pub payload: IrcPayload,
    pub single_point: SinglePointOutcome,
    pub metadata: RunMetadata,
}

/// Runs the reaction-path stage as the owner of the run: computes the mode,
/// traces, optionally refines with a single point, and finalizes exactly once.
#[instrument(skip_all, name = "irc_stage", fields(run_id = %context.run_id))]
pub fn run(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    mut metadata: RunMetadata,
    finalizer: MetadataFinalizer<'_>,
    reporter: &ProgressReporter,
) -> Result<IrcRunResult, EngineError> {
    match execute(context, backend, &mut metadata, reporter) {
        Ok((payload, single_point)) => {
            let metadata = finalizer.finalize(metadata, RunOutcome::Completed)?;
            Ok(IrcRunResult {
                payload,
                single_point,
                metadata,
            })
        }
        Err(e) => {
            error!(error = %e, "IRC calculation failed.");
            if let Err(fe) = finalizer.finalize(
                metadata,
                RunOutcome::Failed {
                    error: &e,
                    details: None,
                },
            ) {
                error!(error = %fe, "Failed to record failed run status.");
            }
            Err(e)
        }
    }
}

fn execute(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    metadata: &mut RunMetadata,
    reporter: &ProgressReporter,
) -> Result<(IrcPayload, SinglePointOutcome), EngineError> {
    let mode = backend.imaginary_mode(context, &context.geometry)?;
    if mode.eigenvalue >= 0.0 {
        warn!(
            eigenvalue = mode.eigenvalue,
            "IRC mode eigenvalue is non-negative; structure may not be a first-order saddle point."
        );
    }
    let payload = trace(context, backend, &mode, context.irc, None, metadata, reporter)?;

    let single_point = if !context.features.single_point_enabled {
        info!("Skipping single-point energy calculation (disabled).");
        SinglePointOutcome::skipped("Single-point calculation disabled.")
    } else if payload.status != StageState::Completed.label() {
        SinglePointOutcome::skipped("IRC did not complete; skipping single-point.")
    } else {
        info!("Calculating single-point energy after IRC.");
        let store = CheckpointStore::new(context.paths.checkpoint_path.clone());
        single_point::refine(context, backend, &context.geometry, &store, reporter)?
    };
    metadata.single_point = Some(single_point.record());

    let sp = single_point.result.as_ref();
    metadata.summary = Some(RunSummary {
        elapsed_seconds: context.elapsed_seconds(),
        n_steps: Some(payload.profile.len() as u64),
        final_energy: payload.profile.last().map(|entry| entry.energy_ev),
        opt_final_energy: None,
        final_sp_energy: sp.map(|r| r.energy),
        final_sp_converged: sp.map(|r| r.converged),
        final_sp_cycles: sp.and_then(|r| r.cycles),
        scf_converged: None,
        opt_converged: None,
        converged: true,
        memory_limit_enforced: context.memory_limit_enforced,
    });
    Ok((payload, single_point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{CalculationParams, SnapshotMode, SnapshotSettings};
    use crate::engine::context::{RunPaths, StageContextBuilder};
    use crate::core::models::geometry::Atom;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn context(run_dir: &Path, snapshots: SnapshotSettings, resume: bool) -> StageContext {
        let geometry: Geometry = vec![
            Atom::new("O", Point3::new(0.0, 0.0, 0.0)),
            Atom::new("H", Point3::new(0.0, 0.0, 0.96)),
        ]
        .into_iter()
        .collect();
        let mut builder = StageContextBuilder::new()
            .run_id("irc-test")
            .paths(RunPaths::in_run_dir(run_dir))
            .geometry(geometry)
            .calculation(CalculationParams {
                basis: "sto-3g".to_string(),
                xc: "pbe".to_string(),
                ..Default::default()
            })
            .snapshots(snapshots);
        if resume {
            builder = builder.resume_dir(run_dir.to_path_buf());
        }
        builder.build().unwrap()
    }

    fn step(recorder: &mut IrcRecorder, geometry: &Geometry, direction: Direction, step: u64) {
        recorder
            .on_step(StepEvent {
                direction,
                step,
                geometry,
                energy_ev: -10.0 - step as f64,
                energy_hartree: (-10.0 - step as f64) / 27.211386,
            })
            .unwrap();
    }

    #[test]
    fn step_snapshots_and_checkpoint_follow_cadence() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), SnapshotSettings::new(Some(2), SnapshotMode::All), false);
        let store = CheckpointStore::new(ctx.paths.checkpoint_path.clone());
        let reporter = ProgressReporter::new();
        let mut recorder = IrcRecorder::new(&ctx, &store, &reporter);

        for s in 0..4 {
            step(&mut recorder, &ctx.geometry, Direction::Forward, s);
        }
        let saved = store.load();
        assert_eq!(saved.irc[Direction::Forward].step, Some(2));
        assert_eq!(saved.irc_profile.len(), 3);
        assert_eq!(saved.last_stage.as_deref(), Some("irc"));
        assert!(saved.irc[Direction::Reverse].steps_xyz.is_some());

        let frames = XyzFile::read_frames_from_path(ctx.paths.irc_steps_snapshot(Direction::Forward))
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].1.ends_with("step=1 direction=forward"));
        assert!(frames[1].1.ends_with("step=3 direction=forward"));
    }

    #[test]
    fn completion_uses_cached_step_over_caller_value() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), SnapshotSettings::new(Some(5), SnapshotMode::Last), false);
        let store = CheckpointStore::new(ctx.paths.checkpoint_path.clone());
        let reporter = ProgressReporter::new();
        let mut recorder = IrcRecorder::new(&ctx, &store, &reporter);

        for s in 0..4 {
            step(&mut recorder, &ctx.geometry, Direction::Reverse, s);
        }
        recorder
            .on_direction_complete(Direction::Reverse, Some(99), None)
            .unwrap();

        let saved = store.load();
        let reverse = &saved.irc[Direction::Reverse];
        assert!(reverse.completed);
        assert_eq!(reverse.step, Some(3));
        assert_eq!(reverse.steps_xyz, None);
        assert_eq!(
            reverse.last_xyz.as_deref(),
            Some(ctx.paths.irc_last_snapshot(Direction::Reverse).as_path())
        );
        let (_, comment) = XyzFile::read_last_frame(ctx.paths.irc_last_snapshot(Direction::Reverse)).unwrap();
        assert!(comment.ends_with("step=3 direction=reverse"));
    }

    #[test]
    fn resume_prefers_existing_snapshot_then_raw_geometry() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), SnapshotSettings::default(), true);
        let store = CheckpointStore::new(ctx.paths.checkpoint_path.clone());

        let snapshot = dir.path().join("forward_last.xyz");
        XyzFile::write_to_path(&ctx.geometry, &"saved".to_string(), &snapshot).unwrap();
        let mut record = CheckpointRecord::new();
        record.irc[Direction::Forward].step = Some(4);
        record.irc[Direction::Forward].last_xyz = Some(PathBuf::from("forward_last.xyz"));
        record.irc[Direction::Reverse].step = Some(2);
        record.irc[Direction::Reverse].last_xyz = Some(PathBuf::from("missing.xyz"));
        record.irc[Direction::Reverse].last_geometry = Some(ctx.geometry.clone());
        store.persist(&record).unwrap();

        let reporter = ProgressReporter::new();
        let mut recorder = IrcRecorder::new(&ctx, &store, &reporter);
        let resume = recorder.resume_state().unwrap();

        assert_eq!(
            resume[Direction::Forward].point,
            Some(ResumePoint {
                step: Some(4),
                xyz: snapshot
            })
        );
        let reverse = resume[Direction::Reverse].point.clone().unwrap();
        assert_eq!(reverse.step, Some(2));
        assert_eq!(reverse.xyz, ctx.paths.irc_resume_geometry(Direction::Reverse));
        let (_, comment) = XyzFile::read_from_path(&reverse.xyz).unwrap();
        assert!(comment.ends_with("resume=checkpoint direction=reverse"));
    }

    #[test]
    fn resume_uses_snapshot_even_without_step_index() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), SnapshotSettings::default(), true);
        let store = CheckpointStore::new(ctx.paths.checkpoint_path.clone());

        let snapshot = dir.path().join("reverse_last.xyz");
        XyzFile::write_to_path(&ctx.geometry, &"saved".to_string(), &snapshot).unwrap();
        let mut record = CheckpointRecord::new();
        record.irc[Direction::Reverse].last_xyz = Some(PathBuf::from("reverse_last.xyz"));
        record.irc[Direction::Forward].last_geometry = Some(ctx.geometry.clone());
        store.persist(&record).unwrap();

        let reporter = ProgressReporter::new();
        let mut recorder = IrcRecorder::new(&ctx, &store, &reporter);
        let resume = recorder.resume_state().unwrap();

        assert_eq!(
            resume[Direction::Reverse].point,
            Some(ResumePoint {
                step: None,
                xyz: snapshot
            })
        );
        // Raw geometry without a step cannot be placed on the path.
        assert_eq!(resume[Direction::Forward].point, None);
        assert!(!ctx.paths.irc_resume_geometry(Direction::Forward).exists());
    }

    #[test]
    fn resume_state_is_empty_without_resume_dir() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), SnapshotSettings::default(), false);
        let store = CheckpointStore::new(ctx.paths.checkpoint_path.clone());
        let mut record = CheckpointRecord::new();
        record.irc[Direction::Forward].completed = true;
        store.persist(&record).unwrap();

        let reporter = ProgressReporter::new();
        let mut recorder = IrcRecorder::new(&ctx, &store, &reporter);
        assert_eq!(recorder.resume_state().unwrap(), ResumeState::default());
    }
}
