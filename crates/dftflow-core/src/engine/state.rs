use super::config::OptimizerMode;
use super::error::EngineError;
use std::fmt;
use tracing::warn;

/// Lifecycle of one downstream stage within a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageState {
    #[default]
    NotStarted,
    Gated(String),
    Running,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Gate(String),
    Start,
    Complete,
    Fail(String),
}

impl StageState {
    /// Applies `event`, returning the next state.
    ///
    /// Terminal states (`Gated`, `Completed`, `Failed`) accept no further events.
    pub fn transition(self, stage: &'static str, event: StageEvent) -> Result<Self, EngineError> {
        match (self, event) {
            (StageState::NotStarted, StageEvent::Gate(reason)) => Ok(StageState::Gated(reason)),
            (StageState::NotStarted, StageEvent::Start) => Ok(StageState::Running),
            (StageState::Running, StageEvent::Complete) => Ok(StageState::Completed),
            (StageState::Running, StageEvent::Fail(reason)) => Ok(StageState::Failed(reason)),
            (from, event) => Err(EngineError::InvalidTransition {
                stage,
                from: from.label().to_string(),
                event: format!("{:?}", event),
            }),
        }
    }

    /// The status string written into payload documents.
    pub fn label(&self) -> &'static str {
        match self {
            StageState::NotStarted => "pending",
            StageState::Gated(_) => "skipped",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Failed(_) => "failed",
        }
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            StageState::Gated(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The downstream action a gate decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTarget {
    ReactionPath,
    SinglePoint,
}

impl GateTarget {
    fn label(self) -> &'static str {
        match self {
            GateTarget::ReactionPath => "IRC",
            GateTarget::SinglePoint => "single-point",
        }
    }

    fn disabled_reason(self) -> &'static str {
        match self {
            GateTarget::ReactionPath => "IRC calculation disabled.",
            GateTarget::SinglePoint => "Single-point calculation disabled.",
        }
    }

    fn unavailable_reason(self) -> &'static str {
        match self {
            GateTarget::ReactionPath => "Imaginary frequency count unavailable; skipping IRC.",
            GateTarget::SinglePoint => "Imaginary frequency count unavailable.",
        }
    }
}

/// Everything the gate looks at. Nothing else influences the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct GateInputs<'a> {
    pub enabled: bool,
    pub imaginary_count: Option<u32>,
    pub optimizer_mode: OptimizerMode,
    pub enforce: bool,
    /// The TS-quality result's explicit `allow_*` flag for this target.
    pub allow: Option<bool>,
    /// The TS-quality result's message, used as the skip reason when `allow` is false.
    pub message: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the stage. `override_note` is set when a failed check was waived
    /// because enforcement is off.
    Proceed { override_note: Option<String> },
    Skip(String),
}

impl GateDecision {
    pub fn proceeds(&self) -> bool {
        matches!(self, GateDecision::Proceed { .. })
    }

    /// The state the target stage starts in.
    pub fn initial_state(&self) -> StageState {
        match self {
            GateDecision::Proceed { .. } => StageState::NotStarted,
            GateDecision::Skip(reason) => StageState::Gated(reason.clone()),
        }
    }
}

/// Decides whether `target` runs.
///
/// A failing check yields `Skip` only when TS-quality enforcement is on;
/// otherwise the stage proceeds and the waived reason is returned as an override note.
pub fn evaluate_gate(target: GateTarget, inputs: &GateInputs<'_>) -> GateDecision {
    if !inputs.enabled {
        return GateDecision::Skip(target.disabled_reason().to_string());
    }

    let failure = match inputs.imaginary_count {
        None => Some(target.unavailable_reason().to_string()),
        Some(count) => match (inputs.optimizer_mode.is_transition_state(), inputs.allow) {
            (true, Some(true)) => None,
            (true, Some(false)) => Some(
                inputs
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or("TS quality checks did not pass.")
                    .to_string(),
            ),
            _ => {
                let expected = inputs.optimizer_mode.expected_imaginary_count();
                (count != expected).then(|| {
                    format!(
                        "Imaginary frequency count does not match expected {}.",
                        expected
                    )
                })
            }
        },
    };

    match failure {
        None => GateDecision::Proceed {
            override_note: None,
        },
        Some(reason) if inputs.enforce => GateDecision::Skip(reason),
        Some(reason) => GateDecision::Proceed {
            override_note: Some(format!(
                "{} Proceeding with {} because ts_quality.enforce is false.",
                reason,
                target.label()
            )),
        },
    }
}

/// [`evaluate_gate`] plus the warnings operators expect to see.
pub fn gate_with_logging(target: GateTarget, inputs: &GateInputs<'_>) -> GateDecision {
    let decision = evaluate_gate(target, inputs);
    match &decision {
        GateDecision::Skip(reason) if inputs.enabled => {
            warn!(target = target.label(), reason = %reason, "Skipping stage.");
        }
        GateDecision::Proceed {
            override_note: Some(note),
        } => {
            warn!(target = target.label(), "{}", note);
        }
        _ => {}
    }
    decision
}
