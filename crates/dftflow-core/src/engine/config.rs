use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {message}")]
    InvalidValue {
        parameter: &'static str,
        message: String,
    },
}

/// Which geometry snapshot files a long-running stage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// No snapshot files at all.
    None,
    /// Only the per-direction "last" file.
    Last,
    /// The per-direction "last" file plus the appended step series.
    #[default]
    All,
}

impl SnapshotMode {
    /// Parses a user-supplied mode; unknown values fall back to [`SnapshotMode::All`].
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            None => SnapshotMode::All,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Unknown snapshot_mode '{}'; defaulting to 'all'.", raw);
                SnapshotMode::All
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotMode::None => "none",
            SnapshotMode::Last => "last",
            SnapshotMode::All => "all",
        }
    }
}

impl FromStr for SnapshotMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SnapshotMode::None),
            "last" => Ok(SnapshotMode::Last),
            "all" => Ok(SnapshotMode::All),
            other => Err(ConfigError::InvalidValue {
                parameter: "snapshot_mode",
                message: format!("expected one of none, last, all; got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized snapshot cadence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSettings {
    interval_steps: u64,
    mode: SnapshotMode,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            interval_steps: 1,
            mode: SnapshotMode::All,
        }
    }
}

impl SnapshotSettings {
    /// Non-positive or absent intervals normalize to 1.
    pub fn new(interval_steps: Option<i64>, mode: SnapshotMode) -> Self {
        let interval_steps = match interval_steps {
            Some(n) if n > 0 => n as u64,
            _ => 1,
        };
        Self {
            interval_steps,
            mode,
        }
    }

    pub fn from_raw(interval_steps: Option<i64>, mode: Option<&str>) -> Self {
        Self::new(interval_steps, SnapshotMode::parse_lenient(mode))
    }

    pub fn interval_steps(&self) -> u64 {
        self.interval_steps
    }

    pub fn mode(&self) -> SnapshotMode {
        self.mode
    }

    pub fn write_step_series(&self) -> bool {
        self.mode == SnapshotMode::All
    }

    pub fn write_last(&self) -> bool {
        matches!(self.mode, SnapshotMode::All | SnapshotMode::Last)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMode {
    #[default]
    Minimum,
    TransitionState,
}

impl OptimizerMode {
    /// Number of imaginary modes a correctly optimized structure should have.
    pub fn expected_imaginary_count(self) -> u32 {
        match self {
            OptimizerMode::Minimum => 0,
            OptimizerMode::TransitionState => 1,
        }
    }

    pub fn is_transition_state(self) -> bool {
        self == OptimizerMode::TransitionState
    }
}

impl FromStr for OptimizerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "minimum" | "min" => Ok(OptimizerMode::Minimum),
            "transition_state" | "ts" => Ok(OptimizerMode::TransitionState),
            other => Err(ConfigError::InvalidValue {
                parameter: "optimizer_mode",
                message: format!("expected 'minimum' or 'transition_state'; got '{}'", other),
            }),
        }
    }
}

/// How dispersion contributes to the frequency Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyDispersionMode {
    #[default]
    Numerical,
    Energy,
    None,
}

impl FrequencyDispersionMode {
    /// Absent values mean [`FrequencyDispersionMode::Numerical`].
    pub fn normalize(value: Option<&str>) -> Result<Self, ConfigError> {
        value.map_or(Ok(Self::Numerical), str::parse)
    }
}

impl FromStr for FrequencyDispersionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numerical" | "fd" => Ok(Self::Numerical),
            "energy" | "energy_only" => Ok(Self::Energy),
            "none" | "off" => Ok(Self::None),
            other => Err(ConfigError::InvalidValue {
                parameter: "frequency.dispersion",
                message: format!("unsupported mode '{}'", other),
            }),
        }
    }
}

/// Electronic-structure parameters forwarded verbatim to the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculationParams {
    pub basis: String,
    pub xc: String,
    pub scf: Option<Value>,
    pub solvent_model: Option<String>,
    pub solvent_name: Option<String>,
    pub solvent_eps: Option<f64>,
    pub dispersion_model: Option<String>,
    pub freq_dispersion_mode: FrequencyDispersionMode,
    pub freq_dispersion_step: Option<f64>,
    pub thermo: Option<Value>,
    pub memory_mb: Option<u64>,
}

impl CalculationParams {
    /// The solvent model only applies when a solvent is named.
    pub fn effective_solvent_model(&self) -> Option<&str> {
        self.solvent_name
            .as_ref()
            .and(self.solvent_model.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    pub profiling: bool,
    pub irc_enabled: bool,
    pub single_point_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrcSettings {
    pub steps: u32,
    pub step_size: f64,
    pub force_threshold: f64,
}

impl Default for IrcSettings {
    fn default() -> Self {
        Self {
            steps: 10,
            step_size: 0.05,
            force_threshold: 0.01,
        }
    }
}

impl IrcSettings {
    pub fn with_overrides(
        steps: Option<u32>,
        step_size: Option<f64>,
        force_threshold: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            steps: steps.unwrap_or(defaults.steps),
            step_size: step_size.unwrap_or(defaults.step_size),
            force_threshold: force_threshold.unwrap_or(defaults.force_threshold),
        }
    }
}

/// Typed TS-quality options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsQualityPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_irc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_single_point: Option<bool>,
}

/// A representation of TS-quality options that can be asked for `enforce`.
///
/// Lookup order is: direct attribute, exported mapping, raw mapping key.
pub trait TsQualitySource {
    fn enforce_attribute(&self) -> Option<bool> {
        None
    }

    fn export(&self) -> Option<Map<String, Value>> {
        None
    }

    fn mapping(&self) -> Option<&Map<String, Value>> {
        None
    }
}

impl TsQualitySource for TsQualityPolicy {
    fn enforce_attribute(&self) -> Option<bool> {
        self.enforce
    }

    fn export(&self) -> Option<Map<String, Value>> {
        match serde_json::to_value(self).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl TsQualitySource for Map<String, Value> {
    fn mapping(&self) -> Option<&Map<String, Value>> {
        Some(self)
    }
}

fn enforce_key(map: &Map<String, Value>) -> Option<bool> {
    match map.get("enforce")? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

/// Whether TS-quality gating is enforced; absent configuration means "not enforced".
pub fn is_ts_quality_enforced(source: Option<&dyn TsQualitySource>) -> bool {
    let Some(source) = source else {
        return false;
    };
    source
        .enforce_attribute()
        .or_else(|| source.export().as_ref().and_then(enforce_key))
        .or_else(|| source.mapping().and_then(enforce_key))
        .unwrap_or(false)
}

/// TS-quality configuration as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TsQualityConfig {
    Policy(TsQualityPolicy),
    Mapping(Map<String, Value>),
}

impl TsQualityConfig {
    pub fn is_enforced(&self) -> bool {
        is_ts_quality_enforced(Some(self as &dyn TsQualitySource))
    }
}

impl TsQualitySource for TsQualityConfig {
    fn enforce_attribute(&self) -> Option<bool> {
        match self {
            TsQualityConfig::Policy(policy) => policy.enforce_attribute(),
            TsQualityConfig::Mapping(_) => None,
        }
    }

    fn export(&self) -> Option<Map<String, Value>> {
        match self {
            TsQualityConfig::Policy(policy) => policy.export(),
            TsQualityConfig::Mapping(_) => None,
        }
    }

    fn mapping(&self) -> Option<&Map<String, Value>> {
        match self {
            TsQualityConfig::Policy(_) => None,
            TsQualityConfig::Mapping(map) => Some(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SplitSource {
        attribute: Option<bool>,
        exported: Map<String, Value>,
    }

    impl TsQualitySource for SplitSource {
        fn enforce_attribute(&self) -> Option<bool> {
            self.attribute
        }

        fn export(&self) -> Option<Map<String, Value>> {
            Some(self.exported.clone())
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn snapshot_interval_normalizes_non_positive_values() {
        assert_eq!(SnapshotSettings::new(Some(0), SnapshotMode::All).interval_steps(), 1);
        assert_eq!(SnapshotSettings::new(Some(-4), SnapshotMode::All).interval_steps(), 1);
        assert_eq!(SnapshotSettings::new(None, SnapshotMode::All).interval_steps(), 1);
        assert_eq!(SnapshotSettings::new(Some(3), SnapshotMode::All).interval_steps(), 3);
    }

    #[test]
    fn unknown_snapshot_mode_falls_back_to_all() {
        assert_eq!(SnapshotMode::parse_lenient(Some("sometimes")), SnapshotMode::All);
        assert_eq!(SnapshotMode::parse_lenient(Some("LAST")), SnapshotMode::Last);
        assert_eq!(SnapshotMode::parse_lenient(None), SnapshotMode::All);
    }

    #[test]
    fn snapshot_mode_derives_write_flags() {
        let all = SnapshotSettings::new(None, SnapshotMode::All);
        let last = SnapshotSettings::new(None, SnapshotMode::Last);
        let none = SnapshotSettings::new(None, SnapshotMode::None);
        assert!(all.write_step_series() && all.write_last());
        assert!(!last.write_step_series() && last.write_last());
        assert!(!none.write_step_series() && !none.write_last());
    }

    #[test]
    fn frequency_dispersion_mode_accepts_aliases() {
        let cases = [
            (None, FrequencyDispersionMode::Numerical),
            (Some("numerical"), FrequencyDispersionMode::Numerical),
            (Some("fd"), FrequencyDispersionMode::Numerical),
            (Some("energy"), FrequencyDispersionMode::Energy),
            (Some("energy_only"), FrequencyDispersionMode::Energy),
            (Some("none"), FrequencyDispersionMode::None),
            (Some("off"), FrequencyDispersionMode::None),
        ];
        for (input, expected) in cases {
            assert_eq!(FrequencyDispersionMode::normalize(input).unwrap(), expected);
        }
        assert!(FrequencyDispersionMode::normalize(Some("analytic")).is_err());
    }

    #[test]
    fn enforce_prefers_attribute_over_export() {
        let source = SplitSource {
            attribute: Some(false),
            exported: object(json!({"enforce": true})),
        };
        assert!(!is_ts_quality_enforced(Some(&source as &dyn TsQualitySource)));

        let source = SplitSource {
            attribute: None,
            exported: object(json!({"enforce": true})),
        };
        assert!(is_ts_quality_enforced(Some(&source as &dyn TsQualitySource)));
    }

    #[test]
    fn enforce_reads_raw_mapping_and_defaults_to_false() {
        let enforced = TsQualityConfig::Mapping(object(json!({"enforce": true})));
        let null = TsQualityConfig::Mapping(object(json!({"enforce": null})));
        assert!(enforced.is_enforced());
        assert!(!null.is_enforced());
        assert!(!is_ts_quality_enforced(None));
        assert!(!TsQualityConfig::Policy(TsQualityPolicy::default()).is_enforced());
    }

    #[test]
    fn expected_imaginary_count_depends_on_optimizer_mode() {
        assert_eq!(OptimizerMode::Minimum.expected_imaginary_count(), 0);
        assert_eq!(OptimizerMode::TransitionState.expected_imaginary_count(), 1);
        assert_eq!(
            "transition-state".parse::<OptimizerMode>().unwrap(),
            OptimizerMode::TransitionState
        );
    }

    #[test]
    fn solvent_model_is_dropped_without_solvent_name() {
        let mut params = CalculationParams {
            solvent_model: Some("pcm".to_string()),
            ..Default::default()
        };
        assert_eq!(params.effective_solvent_model(), None);
        params.solvent_name = Some("water".to_string());
        assert_eq!(params.effective_solvent_model(), Some("pcm"));
    }
}
