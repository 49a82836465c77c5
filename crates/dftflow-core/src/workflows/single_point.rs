use crate::core::models::geometry::Geometry;
use crate::engine::backend::{ComputeBackend, SinglePointResult};
use crate::engine::checkpoint::{CheckpointStore, ScfCheckpoint};
use crate::engine::context::StageContext;
use crate::engine::error::EngineError;
use crate::engine::metadata::SinglePointRecord;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{StageEvent, StageState};
use tracing::{error, info};

pub(crate) const STAGE: &str = "single_point";

/// Result of a single-point refinement attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SinglePointOutcome {
    pub state: StageState,
    pub result: Option<SinglePointResult>,
}

impl SinglePointOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            state: StageState::Gated(reason.into()),
            result: None,
        }
    }

    pub fn record(&self) -> SinglePointRecord {
        let result = self.result.as_ref();
        SinglePointRecord {
            status: self.state.label().to_string(),
            skip_reason: match &self.state {
                StageState::Failed(reason) => Some(reason.clone()),
                other => other.skip_reason().map(str::to_string),
            },
            energy: result.map(|r| r.energy),
            converged: result.map(|r| r.converged),
            cycles: result.and_then(|r| r.cycles),
            dispersion_info: result.and_then(|r| r.dispersion.clone()),
            profiling: result.and_then(|r| r.profiling.clone()),
        }
    }
}

/// Runs the single-point refinement and merges its SCF state into the checkpoint.
///
/// Failures are local: they are logged and reported as a `Failed` state, never returned.
pub(crate) fn refine(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    geometry: &Geometry,
    store: &CheckpointStore,
    reporter: &ProgressReporter,
) -> Result<SinglePointOutcome, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Single Point",
    });
    let state = StageState::NotStarted.transition(STAGE, StageEvent::Start)?;

    let attempt = backend.single_point(context, geometry).and_then(|result| {
        store.update_scf(&ScfCheckpoint {
            chkfile: context.paths.scf_chkfile.clone(),
            energy: Some(result.energy),
            converged: Some(result.converged),
        })?;
        Ok(result)
    });

    let outcome = match attempt {
        Ok(result) => {
            info!(
                energy = result.energy,
                converged = result.converged,
                "Single-point energy computed."
            );
            SinglePointOutcome {
                state: state.transition(STAGE, StageEvent::Complete)?,
                result: Some(result),
            }
        }
        Err(e) => {
            error!(error = %e, "Single-point calculation failed.");
            SinglePointOutcome {
                state: state.transition(
                    STAGE,
                    StageEvent::Fail("Single-point calculation failed.".to_string()),
                )?,
                result: None,
            }
        }
    };
    reporter.report(Progress::PhaseFinish);
    Ok(outcome)
}
