use super::config::{
    CalculationParams, ConfigError, FeatureFlags, IrcSettings, OptimizerMode, SnapshotSettings,
    TsQualityConfig,
};
use super::direction::Direction;
use super::utils::fs::resolve_run_path;
use crate::core::io::xyz::ChargeSpin;
use crate::core::models::geometry::Geometry;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File-system layout of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub checkpoint_path: Option<PathBuf>,
    pub run_metadata_path: PathBuf,
    pub event_log_path: PathBuf,
    pub frequency_output_path: PathBuf,
    pub irc_output_path: PathBuf,
    pub irc_profile_csv_path: PathBuf,
    pub scf_chkfile: Option<PathBuf>,
}

impl RunPaths {
    /// Default file names, all placed inside `run_dir`.
    pub fn in_run_dir(run_dir: impl Into<PathBuf>) -> Self {
        let run_dir = run_dir.into();
        Self {
            checkpoint_path: Some(run_dir.join("checkpoint.json")),
            run_metadata_path: run_dir.join("metadata.json"),
            event_log_path: run_dir.join("events.jsonl"),
            frequency_output_path: run_dir.join("frequency_result.json"),
            irc_output_path: run_dir.join("irc_result.json"),
            irc_profile_csv_path: run_dir.join("irc_profile.csv"),
            scf_chkfile: None,
            run_dir,
        }
    }

    pub fn resolve(&self, value: impl AsRef<Path>) -> PathBuf {
        resolve_run_path(&self.run_dir, value)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.resolve("snapshots")
    }

    pub fn irc_steps_snapshot(&self, direction: Direction) -> PathBuf {
        self.snapshot_dir()
            .join(format!("irc_{}_steps.xyz", direction))
    }

    pub fn irc_last_snapshot(&self, direction: Direction) -> PathBuf {
        self.snapshot_dir().join(format!("irc_{}_last.xyz", direction))
    }

    /// Where a geometry recovered from a raw checkpoint entry is materialized.
    pub fn irc_resume_geometry(&self, direction: Direction) -> PathBuf {
        self.resolve(format!("resume_irc_{}_last_geometry.xyz", direction))
    }
}

/// Everything a stage needs to know about the run it belongs to.
///
/// Built once per invocation and read by every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: String,
    pub paths: RunPaths,
    pub geometry: Geometry,
    pub input_xyz: Option<PathBuf>,
    pub charge_spin: ChargeSpin,
    pub calculation: CalculationParams,
    pub optimizer_mode: OptimizerMode,
    pub features: FeatureFlags,
    pub ts_quality: Option<TsQualityConfig>,
    pub snapshots: SnapshotSettings,
    pub irc: IrcSettings,
    pub resume_dir: Option<PathBuf>,
    pub memory_limit_enforced: bool,
    pub run_start: Instant,
}

impl StageContext {
    pub fn ts_quality_enforced(&self) -> bool {
        self.ts_quality
            .as_ref()
            .is_some_and(TsQualityConfig::is_enforced)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.run_start.elapsed().as_secs_f64()
    }
}

#[derive(Default)]
pub struct StageContextBuilder {
    run_id: Option<String>,
    paths: Option<RunPaths>,
    geometry: Option<Geometry>,
    input_xyz: Option<PathBuf>,
    charge_spin: ChargeSpin,
    calculation: Option<CalculationParams>,
    optimizer_mode: OptimizerMode,
    features: FeatureFlags,
    ts_quality: Option<TsQualityConfig>,
    snapshots: SnapshotSettings,
    irc: IrcSettings,
    resume_dir: Option<PathBuf>,
    memory_limit_enforced: bool,
    run_start: Option<Instant>,
}

impl StageContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
    pub fn paths(mut self, paths: RunPaths) -> Self {
        self.paths = Some(paths);
        self
    }
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }
    pub fn input_xyz(mut self, path: PathBuf) -> Self {
        self.input_xyz = Some(path);
        self
    }
    pub fn charge_spin(mut self, charge_spin: ChargeSpin) -> Self {
        self.charge_spin = charge_spin;
        self
    }
    pub fn calculation(mut self, params: CalculationParams) -> Self {
        self.calculation = Some(params);
        self
    }
    pub fn optimizer_mode(mut self, mode: OptimizerMode) -> Self {
        self.optimizer_mode = mode;
        self
    }
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }
    pub fn ts_quality(mut self, ts_quality: TsQualityConfig) -> Self {
        self.ts_quality = Some(ts_quality);
        self
    }
    pub fn snapshots(mut self, snapshots: SnapshotSettings) -> Self {
        self.snapshots = snapshots;
        self
    }
    pub fn irc(mut self, irc: IrcSettings) -> Self {
        self.irc = irc;
        self
    }
    pub fn resume_dir(mut self, dir: PathBuf) -> Self {
        self.resume_dir = Some(dir);
        self
    }
    pub fn memory_limit_enforced(mut self, enforced: bool) -> Self {
        self.memory_limit_enforced = enforced;
        self
    }
    pub fn run_start(mut self, start: Instant) -> Self {
        self.run_start = Some(start);
        self
    }

    pub fn build(self) -> Result<StageContext, ConfigError> {
        let calculation = self
            .calculation
            .ok_or(ConfigError::MissingParameter("calculation"))?;
        if calculation.basis.trim().is_empty() {
            return Err(ConfigError::MissingParameter("basis"));
        }
        if calculation.xc.trim().is_empty() {
            return Err(ConfigError::MissingParameter("xc"));
        }
        if let Some(step) = calculation.freq_dispersion_step {
            if step <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    parameter: "frequency.dispersion_step",
                    message: format!("must be positive, got {}", step),
                });
            }
        }
        Ok(StageContext {
            run_id: self.run_id.ok_or(ConfigError::MissingParameter("run_id"))?,
            paths: self.paths.ok_or(ConfigError::MissingParameter("paths"))?,
            geometry: self
                .geometry
                .ok_or(ConfigError::MissingParameter("geometry"))?,
            input_xyz: self.input_xyz,
            charge_spin: self.charge_spin,
            calculation,
            optimizer_mode: self.optimizer_mode,
            features: self.features,
            ts_quality: self.ts_quality,
            snapshots: self.snapshots,
            irc: self.irc,
            resume_dir: self.resume_dir,
            memory_limit_enforced: self.memory_limit_enforced,
            run_start: self.run_start.unwrap_or_else(Instant::now),
        })
    }
}
