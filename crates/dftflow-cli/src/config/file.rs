use crate::error::{CliError, Result};
use dftflow::engine::config::TsQualityPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCalculationConfig {
    pub basis: Option<String>,
    pub xc: Option<String>,
    pub scf: Option<Value>,
    pub solvent: Option<String>,
    pub solvent_model: Option<String>,
    pub solvent_eps: Option<f64>,
    pub dispersion: Option<String>,
    pub thermo: Option<Value>,
    pub memory_mb: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFrequencyConfig {
    pub dispersion_mode: Option<String>,
    pub dispersion_step: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOptimizerConfig {
    pub mode: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileStagesConfig {
    pub irc: Option<bool>,
    pub single_point: Option<bool>,
    pub profiling: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileIrcConfig {
    pub steps: Option<u32>,
    pub step_size: Option<f64>,
    pub force_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSnapshotConfig {
    pub interval_steps: Option<i64>,
    pub mode: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileTsQualityConfig {
    pub enforce: Option<bool>,
    pub allow_irc: Option<bool>,
    pub allow_single_point: Option<bool>,
}

impl From<FileTsQualityConfig> for TsQualityPolicy {
    fn from(p: FileTsQualityConfig) -> Self {
        Self {
            enforce: p.enforce,
            allow_irc: p.allow_irc,
            allow_single_point: p.allow_single_point,
        }
    }
}

/// The TOML run file as written by the user; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub run_dir: Option<PathBuf>,
    pub run_id: Option<String>,
    pub input_xyz: Option<PathBuf>,
    pub recording: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub scf_chkfile: Option<PathBuf>,
    pub charge: Option<i32>,
    pub spin: Option<u32>,
    pub multiplicity: Option<u32>,
    pub resume: Option<bool>,
    pub memory_limit_enforced: Option<bool>,

    pub calculation: Option<FileCalculationConfig>,
    pub frequency: Option<FileFrequencyConfig>,
    pub optimizer: Option<FileOptimizerConfig>,
    pub stages: Option<FileStagesConfig>,
    pub irc: Option<FileIrcConfig>,
    pub snapshots: Option<FileSnapshotConfig>,
    pub ts_quality: Option<FileTsQualityConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_nested_tables_with_kebab_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
                run-dir = "runs/ts1"
                charge = -1
                multiplicity = 2

                [calculation]
                basis = "def2-svp"
                xc = "wb97x-d"
                scf = { max-cycle = 200, conv-tol = 1e-9 }
                solvent = "water"
                solvent-model = "pcm"

                [stages]
                irc = true
                single-point = true

                [ts-quality]
                enforce = true
                allow-irc = false
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.run_dir, Some(PathBuf::from("runs/ts1")));
        assert_eq!(config.charge, Some(-1));
        let calc = config.calculation.unwrap();
        assert_eq!(calc.basis.as_deref(), Some("def2-svp"));
        assert_eq!(calc.scf.unwrap()["max-cycle"], 200);
        assert_eq!(calc.solvent_model.as_deref(), Some("pcm"));
        assert_eq!(config.stages.unwrap().single_point, Some(true));
        let policy: TsQualityPolicy = config.ts_quality.unwrap().into();
        assert_eq!(policy.enforce, Some(true));
        assert_eq!(policy.allow_irc, Some(false));
        assert_eq!(policy.allow_single_point, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "[irc]\nstep-count = 3\n").unwrap();

        let result = FileConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = FileConfig::from_file(Path::new("/nonexistent/run.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
