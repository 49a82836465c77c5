#![allow(dead_code)]

use dftflow::core::models::geometry::{Atom, Geometry};
use dftflow::engine::backend::{FrequencyResult, ImaginaryMode, SinglePointResult, TsQualityResult};
use dftflow::engine::config::{
    CalculationParams, FeatureFlags, IrcSettings, OptimizerMode, SnapshotMode, SnapshotSettings,
    TsQualityConfig, TsQualityPolicy,
};
use dftflow::engine::context::{RunPaths, StageContext, StageContextBuilder};
use dftflow::engine::direction::Direction;
use dftflow::engine::metadata::{
    MetadataFinalizer, NoopQueue, QueueError, QueueUpdate, RunMetadata, RunQueue, RunStatus,
};
use dftflow::engine::replay::{FailurePoint, RecordedPath, RecordedStep, Recording};
use nalgebra::{Point3, Vector3};
use serde_json::Value;
use std::cell::RefCell;
use std::fs;
use std::path::Path;

pub fn ts_geometry() -> Geometry {
    vec![
        Atom::new("C", Point3::new(0.0, 0.0, 0.0)),
        Atom::new("H", Point3::new(0.0, 0.0, 1.09)),
        Atom::new("F", Point3::new(0.0, 0.0, -1.9)),
    ]
    .into_iter()
    .collect()
}

pub fn steps(range: std::ops::RangeInclusive<u64>, origin: f64, slope: f64) -> Vec<RecordedStep> {
    range
        .map(|step| RecordedStep {
            step,
            energy_hartree: origin - slope * step as f64,
            geometry: None,
        })
        .collect()
}

pub fn recording(forward_last: u64, reverse_last: u64) -> Recording {
    Recording {
        frequency: Some(FrequencyResult {
            energy: Some(-139.5),
            converged: Some(true),
            cycles: Some(14),
            imaginary_count: Some(1),
            frequencies_wavenumber: vec![-512.3, 310.0, 1200.5],
            ..Default::default()
        }),
        imaginary_mode: Some(ImaginaryMode {
            eigenvalue: -0.031,
            mode: vec![Vector3::new(0.0, 0.0, 1.0); 3],
        }),
        single_point: Some(SinglePointResult {
            energy: -139.62,
            converged: true,
            cycles: Some(11),
            dispersion: None,
            profiling: None,
        }),
        reaction_path: RecordedPath {
            forward: steps(0..=forward_last, -139.5, 0.001),
            reverse: steps(0..=reverse_last, -139.5, 0.002),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn fail_after(mut recording: Recording, direction: Direction, step: u64) -> Recording {
    recording.reaction_path.fail_after = Some(FailurePoint { direction, step });
    recording
}

pub fn with_quality(mut recording: Recording, quality: TsQualityResult, count: Option<u32>) -> Recording {
    if let Some(frequency) = recording.frequency.as_mut() {
        frequency.ts_quality = Some(quality);
        frequency.imaginary_count = count;
    }
    recording
}

pub struct ContextOptions {
    pub snapshots: SnapshotSettings,
    pub resume: bool,
    pub enforce: Option<bool>,
    pub features: FeatureFlags,
    pub irc_steps: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            snapshots: SnapshotSettings::new(Some(1), SnapshotMode::All),
            resume: false,
            enforce: None,
            features: FeatureFlags {
                profiling: false,
                irc_enabled: true,
                single_point_enabled: true,
            },
            irc_steps: 50,
        }
    }
}

pub fn context(run_dir: &Path, options: ContextOptions) -> StageContext {
    let mut builder = StageContextBuilder::new()
        .run_id("integration")
        .paths(RunPaths::in_run_dir(run_dir))
        .geometry(ts_geometry())
        .calculation(CalculationParams {
            basis: "def2-svp".to_string(),
            xc: "wb97x-d".to_string(),
            ..Default::default()
        })
        .optimizer_mode(OptimizerMode::TransitionState)
        .features(options.features)
        .snapshots(options.snapshots)
        .irc(IrcSettings::with_overrides(Some(options.irc_steps), None, None));
    if let Some(enforce) = options.enforce {
        builder = builder.ts_quality(TsQualityConfig::Policy(TsQualityPolicy {
            enforce: Some(enforce),
            ..Default::default()
        }));
    }
    if options.resume {
        builder = builder.resume_dir(run_dir.to_path_buf());
    }
    builder.build().expect("test context is complete")
}

/// Counts every status the finalizer publishes.
#[derive(Default)]
pub struct CountingQueue {
    pub statuses: RefCell<Vec<RunStatus>>,
}

impl CountingQueue {
    pub fn terminal_count(&self) -> usize {
        self.statuses
            .borrow()
            .iter()
            .filter(|s| matches!(s, RunStatus::Completed | RunStatus::Failed))
            .count()
    }
}

impl RunQueue for CountingQueue {
    fn record_status(&self, update: &QueueUpdate<'_>) -> Result<(), QueueError> {
        self.statuses.borrow_mut().push(update.status);
        Ok(())
    }
}

pub fn finalizer<'q>(ctx: &StageContext, queue: &'q dyn RunQueue) -> MetadataFinalizer<'q> {
    MetadataFinalizer::new(ctx.paths.clone(), ctx.run_id.clone(), queue)
}

pub fn noop_finalizer(ctx: &StageContext) -> MetadataFinalizer<'static> {
    MetadataFinalizer::new(ctx.paths.clone(), ctx.run_id.clone(), &NoopQueue)
}

pub fn started_metadata(finalizer: &MetadataFinalizer<'_>) -> RunMetadata {
    let mut metadata = RunMetadata::new(finalizer.run_id());
    finalizer.mark_running(&mut metadata).expect("mark running");
    metadata
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("file exists")).expect("valid json")
}

pub fn event_statuses(ctx: &StageContext) -> Vec<String> {
    fs::read_to_string(&ctx.paths.event_log_path)
        .unwrap_or_default()
        .lines()
        .map(|line| {
            let event: Value = serde_json::from_str(line).expect("event line is json");
            event["status"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}
