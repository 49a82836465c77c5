use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use dftflow::core::io::traits::MolecularFile;
use dftflow::core::io::xyz::{ChargeSpin, XyzFile};
use dftflow::engine::config::{
    CalculationParams, FeatureFlags, FrequencyDispersionMode, IrcSettings, OptimizerMode,
    SnapshotSettings, TsQualityConfig,
};
use dftflow::engine::context::{RunPaths, StageContextBuilder};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let run_dir = args
        .run_dir
        .clone()
        .or(file_config.run_dir.take())
        .unwrap_or_else(|| PathBuf::from(defaults.run_dir));
    let run_id = file_config
        .run_id
        .take()
        .or_else(|| {
            run_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .ok_or_else(|| CliError::Config("Cannot derive a run id; set `run-id`".to_string()))?;

    let recording = args
        .recording
        .clone()
        .or(file_config.recording.take())
        .ok_or_else(|| {
            CliError::Config(
                "No recording given; pass --recording or set `recording` in the run file"
                    .to_string(),
            )
        })?;

    let input_xyz = args
        .input
        .clone()
        .or(file_config.input_xyz.take())
        .ok_or_else(|| {
            CliError::Config("No input geometry given; pass --input or set `input-xyz`".to_string())
        })?;
    let (geometry, _) = read_geometry(&input_xyz)?;

    let spin = file_config.spin.unwrap_or(defaults.spin);
    let charge_spin = ChargeSpin {
        charge: file_config.charge.unwrap_or(defaults.charge),
        spin,
        multiplicity: file_config.multiplicity.unwrap_or(spin + 1),
    };

    let calculation = merge_calculation(&mut file_config)?;

    let optimizer_mode = file_config
        .optimizer
        .take()
        .and_then(|o| o.mode)
        .as_deref()
        .map_or_else(
            || OptimizerMode::from_str(defaults.optimizer_mode),
            OptimizerMode::from_str,
        )?;

    let stages = file_config.stages.take().unwrap_or_default();
    let features = FeatureFlags {
        profiling: stages.profiling.unwrap_or(defaults.profiling),
        irc_enabled: stages.irc.unwrap_or(defaults.irc_enabled),
        single_point_enabled: stages.single_point.unwrap_or(defaults.single_point_enabled),
    };

    let irc_file = file_config.irc.take().unwrap_or_default();
    let irc = IrcSettings::with_overrides(
        irc_file.steps,
        irc_file.step_size,
        irc_file.force_threshold,
    );

    let snapshot_file = file_config.snapshots.take().unwrap_or_default();
    let snapshots = SnapshotSettings::from_raw(
        args.snapshot_interval
            .or(snapshot_file.interval_steps)
            .or(Some(defaults.snapshot_interval_steps)),
        args.snapshot_mode
            .as_deref()
            .or(snapshot_file.mode.as_deref())
            .or(Some(defaults.snapshot_mode)),
    );

    let mut paths = RunPaths::in_run_dir(&run_dir);
    if let Some(checkpoint) = &file_config.checkpoint {
        paths.checkpoint_path = Some(paths.resolve(checkpoint));
    }
    if let Some(chkfile) = &file_config.scf_chkfile {
        paths.scf_chkfile = Some(paths.resolve(chkfile));
    }

    let mut builder = StageContextBuilder::new()
        .run_id(run_id)
        .paths(paths)
        .geometry(geometry)
        .input_xyz(input_xyz)
        .charge_spin(charge_spin)
        .calculation(calculation)
        .optimizer_mode(optimizer_mode)
        .features(features)
        .snapshots(snapshots)
        .irc(irc)
        .memory_limit_enforced(file_config.memory_limit_enforced.unwrap_or(false));

    if let Some(ts_quality) = file_config.ts_quality.take() {
        builder = builder.ts_quality(TsQualityConfig::Policy(ts_quality.into()));
    }
    if args.resume || file_config.resume.unwrap_or(false) {
        debug!("Resume requested; stages will read state from {:?}", &run_dir);
        builder = builder.resume_dir(run_dir.clone());
    }

    let context = builder.build()?;

    Ok(AppConfig {
        stage: args.stage,
        recording,
        context,
    })
}

fn read_geometry(path: &Path) -> Result<(dftflow::core::models::geometry::Geometry, String)> {
    XyzFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn merge_calculation(file_config: &mut FileConfig) -> Result<CalculationParams> {
    let calc = file_config.calculation.take().unwrap_or_default();
    let freq = file_config.frequency.take().unwrap_or_default();
    let freq_dispersion_mode =
        FrequencyDispersionMode::normalize(freq.dispersion_mode.as_deref())?;

    Ok(CalculationParams {
        basis: calc.basis.unwrap_or_default(),
        xc: calc.xc.unwrap_or_default(),
        scf: calc.scf,
        solvent_model: calc.solvent_model,
        solvent_name: calc.solvent,
        solvent_eps: calc.solvent_eps,
        dispersion_model: calc.dispersion,
        freq_dispersion_mode,
        freq_dispersion_step: freq.dispersion_step,
        thermo: calc.thermo,
        memory_mb: calc.memory_mb,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
        if parts.len() != 2 {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        }
        let key = parts[0];
        let value_str = parts[1];

        match key {
            "run-id" => config.run_id = Some(value_str.to_string()),
            "charge" => config.charge = Some(parse_value(key, value_str, "integer")?),
            "spin" => config.spin = Some(parse_value(key, value_str, "integer")?),
            "multiplicity" => config.multiplicity = Some(parse_value(key, value_str, "integer")?),
            "calculation.basis" => {
                config
                    .calculation
                    .get_or_insert_with(Default::default)
                    .basis = Some(value_str.to_string());
            }
            "calculation.xc" => {
                config.calculation.get_or_insert_with(Default::default).xc =
                    Some(value_str.to_string());
            }
            "calculation.solvent" => {
                config
                    .calculation
                    .get_or_insert_with(Default::default)
                    .solvent = Some(value_str.to_string());
            }
            "calculation.solvent-model" => {
                config
                    .calculation
                    .get_or_insert_with(Default::default)
                    .solvent_model = Some(value_str.to_string());
            }
            "calculation.solvent-eps" => {
                config
                    .calculation
                    .get_or_insert_with(Default::default)
                    .solvent_eps = Some(parse_value(key, value_str, "float")?);
            }
            "calculation.dispersion" => {
                config
                    .calculation
                    .get_or_insert_with(Default::default)
                    .dispersion = Some(value_str.to_string());
            }
            "frequency.dispersion-mode" => {
                config
                    .frequency
                    .get_or_insert_with(Default::default)
                    .dispersion_mode = Some(value_str.to_string());
            }
            "frequency.dispersion-step" => {
                config
                    .frequency
                    .get_or_insert_with(Default::default)
                    .dispersion_step = Some(parse_value(key, value_str, "float")?);
            }
            "optimizer.mode" => {
                config.optimizer.get_or_insert_with(Default::default).mode =
                    Some(value_str.to_string());
            }
            "stages.irc" => {
                config.stages.get_or_insert_with(Default::default).irc =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "stages.single-point" => {
                config.stages.get_or_insert_with(Default::default).single_point =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "stages.profiling" => {
                config.stages.get_or_insert_with(Default::default).profiling =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "irc.steps" => {
                config.irc.get_or_insert_with(Default::default).steps =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "irc.step-size" => {
                config.irc.get_or_insert_with(Default::default).step_size =
                    Some(parse_value(key, value_str, "float")?);
            }
            "irc.force-threshold" => {
                config.irc.get_or_insert_with(Default::default).force_threshold =
                    Some(parse_value(key, value_str, "float")?);
            }
            "snapshots.interval-steps" => {
                config
                    .snapshots
                    .get_or_insert_with(Default::default)
                    .interval_steps = Some(parse_value(key, value_str, "integer")?);
            }
            "snapshots.mode" => {
                config.snapshots.get_or_insert_with(Default::default).mode =
                    Some(value_str.to_string());
            }
            "ts-quality.enforce" => {
                config.ts_quality.get_or_insert_with(Default::default).enforce =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "ts-quality.allow-irc" => {
                config.ts_quality.get_or_insert_with(Default::default).allow_irc =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "ts-quality.allow-single-point" => {
                config
                    .ts_quality
                    .get_or_insert_with(Default::default)
                    .allow_single_point = Some(parse_value(key, value_str, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
