//! The seam between stage orchestration and the quantum-chemistry code.
//!
//! Stages never compute anything themselves. They ask a [`ComputeBackend`]
//! for frequencies, the imaginary mode, single-point energies and the
//! reaction-path integration, and receive step events through a
//! [`PathObserver`] while the integration runs.

use super::config::IrcSettings;
use super::context::StageContext;
use super::direction::{Direction, DirectionSlots};
use super::error::EngineError;
use crate::core::models::geometry::Geometry;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const HARTREE_TO_EV: f64 = 27.211386245988;

/// Outcome of the backend's transition-state quality checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TsQualityResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub allow_irc: Option<bool>,
    #[serde(default)]
    pub allow_single_point: Option<bool>,
}

/// The backend's own reading of the imaginary-mode count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImaginaryCheck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyResult {
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub converged: Option<bool>,
    #[serde(default)]
    pub cycles: Option<u32>,
    #[serde(default)]
    pub imaginary_count: Option<u32>,
    #[serde(default)]
    pub frequencies_wavenumber: Vec<f64>,
    #[serde(default)]
    pub thermochemistry: Option<Value>,
    #[serde(default)]
    pub dispersion: Option<Value>,
    #[serde(default)]
    pub profiling: Option<Value>,
    #[serde(default)]
    pub imaginary_check: Option<ImaginaryCheck>,
    #[serde(default)]
    pub ts_quality: Option<TsQualityResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImaginaryMode {
    /// Hessian eigenvalue of the mode; negative for a true saddle point.
    pub eigenvalue: f64,
    /// Mass-weighted displacement, one vector per atom.
    pub mode: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglePointResult {
    pub energy: f64,
    pub converged: bool,
    #[serde(default)]
    pub cycles: Option<u32>,
    #[serde(default)]
    pub dispersion: Option<Value>,
    #[serde(default)]
    pub profiling: Option<Value>,
}

/// Where a partially traced direction should pick up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    /// Absent when the checkpoint kept a snapshot but lost its step index.
    pub step: Option<u64>,
    pub xyz: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionResume {
    pub completed: bool,
    pub point: Option<ResumePoint>,
}

pub type ResumeState = DirectionSlots<DirectionResume>;

pub struct IrcRequest<'a> {
    pub context: &'a StageContext,
    pub geometry: &'a Geometry,
    pub mode: &'a ImaginaryMode,
    pub settings: IrcSettings,
    /// Completed directions must be skipped; partial ones resume at their point.
    pub resume: &'a ResumeState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrcOutcome {
    pub profiling: Option<Value>,
}

/// One evaluated reaction-path step.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    pub direction: Direction,
    pub step: u64,
    pub geometry: &'a Geometry,
    pub energy_ev: f64,
    pub energy_hartree: f64,
}

/// Receives integration events synchronously, in delivery order.
pub trait PathObserver {
    fn on_step(&mut self, event: StepEvent<'_>) -> Result<(), EngineError>;

    /// Called once when integration in `direction` terminates.
    fn on_direction_complete(
        &mut self,
        direction: Direction,
        step: Option<u64>,
        geometry: Option<&Geometry>,
    ) -> Result<(), EngineError>;
}

pub trait ComputeBackend {
    fn name(&self) -> &str;

    fn version(&self) -> Option<String> {
        None
    }

    fn frequencies(&self, context: &StageContext) -> Result<FrequencyResult, EngineError>;

    fn imaginary_mode(
        &self,
        context: &StageContext,
        geometry: &Geometry,
    ) -> Result<ImaginaryMode, EngineError>;

    fn single_point(
        &self,
        context: &StageContext,
        geometry: &Geometry,
    ) -> Result<SinglePointResult, EngineError>;

    fn reaction_path(
        &self,
        request: &IrcRequest<'_>,
        observer: &mut dyn PathObserver,
    ) -> Result<IrcOutcome, EngineError>;
}
