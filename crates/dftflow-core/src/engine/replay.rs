use super::backend::{
    ComputeBackend, FrequencyResult, HARTREE_TO_EV, ImaginaryMode, IrcOutcome, IrcRequest,
    PathObserver, SinglePointResult, StepEvent,
};
use super::context::StageContext;
use super::direction::{Direction, DirectionSlots};
use super::error::EngineError;
use crate::core::models::geometry::Geometry;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedStep {
    pub step: u64,
    pub energy_hartree: f64,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FailurePoint {
    pub direction: Direction,
    pub step: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedPath {
    #[serde(default)]
    pub forward: Vec<RecordedStep>,
    #[serde(default)]
    pub reverse: Vec<RecordedStep>,
    /// Abort the integration right after delivering this step.
    #[serde(default)]
    pub fail_after: Option<FailurePoint>,
    #[serde(default)]
    pub profiling: Option<Value>,
}

impl RecordedPath {
    fn steps(&self, direction: Direction) -> &[RecordedStep] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}

/// Messages for backend calls that should fail.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedFailures {
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub imaginary_mode: Option<String>,
    #[serde(default)]
    pub single_point: Option<String>,
    #[serde(default)]
    pub reaction_path: Option<String>,
}

/// A recorded set of backend results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recording {
    #[serde(default)]
    pub frequency: Option<FrequencyResult>,
    #[serde(default)]
    pub imaginary_mode: Option<ImaginaryMode>,
    #[serde(default)]
    pub single_point: Option<SinglePointResult>,
    #[serde(default)]
    pub reaction_path: RecordedPath,
    #[serde(default)]
    pub failures: RecordedFailures,
}

/// Plays back a [`Recording`] as if it were a live backend.
///
/// Reaction-path replay honors the resume state: completed directions are
/// skipped and partial ones restart at their resume step, which is delivered
/// again just as a real integrator re-evaluates its starting geometry.
#[derive(Debug, Clone, Default)]
pub struct ReplayBackend {
    recording: Recording,
}

impl ReplayBackend {
    pub fn new(recording: Recording) -> Self {
        Self { recording }
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    fn fail_if(stage: &'static str, failure: &Option<String>) -> Result<(), EngineError> {
        match failure {
            Some(message) => Err(EngineError::backend(stage, message.clone())),
            None => Ok(()),
        }
    }
}

impl ComputeBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    fn version(&self) -> Option<String> {
        Some(env!("CARGO_PKG_VERSION").to_string())
    }

    fn frequencies(&self, _context: &StageContext) -> Result<FrequencyResult, EngineError> {
        Self::fail_if("frequency", &self.recording.failures.frequency)?;
        self.recording
            .frequency
            .clone()
            .ok_or_else(|| EngineError::backend("frequency", "no recorded frequency result"))
    }

    fn imaginary_mode(
        &self,
        _context: &StageContext,
        _geometry: &Geometry,
    ) -> Result<ImaginaryMode, EngineError> {
        Self::fail_if("imaginary mode", &self.recording.failures.imaginary_mode)?;
        self.recording
            .imaginary_mode
            .clone()
            .ok_or_else(|| EngineError::backend("imaginary mode", "no recorded imaginary mode"))
    }

    fn single_point(
        &self,
        _context: &StageContext,
        _geometry: &Geometry,
    ) -> Result<SinglePointResult, EngineError> {
        Self::fail_if("single point", &self.recording.failures.single_point)?;
        self.recording
            .single_point
            .clone()
            .ok_or_else(|| EngineError::backend("single point", "no recorded single-point result"))
    }

    fn reaction_path(
        &self,
        request: &IrcRequest<'_>,
        observer: &mut dyn PathObserver,
    ) -> Result<IrcOutcome, EngineError> {
        Self::fail_if("irc", &self.recording.failures.reaction_path)?;
        let path = &self.recording.reaction_path;
        let max_step = u64::from(request.settings.steps);
        let mut delivered = DirectionSlots::<usize>::default();

        for direction in Direction::ALL {
            let resume = &request.resume[direction];
            if resume.completed {
                debug!(direction = %direction, "Direction already completed; skipping.");
                continue;
            }
            let start = resume
                .point
                .as_ref()
                .and_then(|point| point.step)
                .unwrap_or(0);

            let mut last: Option<&RecordedStep> = None;
            for recorded in path
                .steps(direction)
                .iter()
                .filter(|s| s.step >= start && s.step <= max_step)
            {
                let geometry = recorded.geometry.as_ref().unwrap_or(request.geometry);
                observer.on_step(StepEvent {
                    direction,
                    step: recorded.step,
                    geometry,
                    energy_ev: recorded.energy_hartree * HARTREE_TO_EV,
                    energy_hartree: recorded.energy_hartree,
                })?;
                delivered[direction] += 1;
                last = Some(recorded);

                if path.fail_after
                    == Some(FailurePoint {
                        direction,
                        step: recorded.step,
                    })
                {
                    return Err(EngineError::backend(
                        "irc",
                        format!("integration aborted after {} step {}", direction, recorded.step),
                    ));
                }
            }

            observer.on_direction_complete(
                direction,
                last.map(|s| s.step),
                last.map(|s| s.geometry.as_ref().unwrap_or(request.geometry)),
            )?;
        }

        debug!(
            forward = delivered[Direction::Forward],
            reverse = delivered[Direction::Reverse],
            "Replayed reaction path."
        );
        Ok(IrcOutcome {
            profiling: path.profiling.clone(),
        })
    }
}
