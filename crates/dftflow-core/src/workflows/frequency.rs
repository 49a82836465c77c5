//! Frequency stage.
//!
//! Runs the frequency analysis, writes its payload, and then gates the two
//! downstream actions (reaction-path trace and single-point refinement) on
//! the imaginary-mode count and the TS-quality result. The frequency payload
//! is always on disk before any downstream stage starts.

use super::irc::{self, IrcPayload};
use super::single_point::{self, SinglePointOutcome};
use crate::engine::backend::{ComputeBackend, FrequencyResult, TsQualityResult};
use crate::engine::checkpoint::{CheckpointStore, ScfCheckpoint};
use crate::engine::config::FrequencyDispersionMode;
use crate::engine::context::StageContext;
use crate::engine::error::EngineError;
use crate::engine::metadata::{
    MetadataFinalizer, RunMetadata, RunOutcome, RunSummary, SinglePointRecord, StageRecord,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{
    GateDecision, GateInputs, GateTarget, StageEvent, StageState, gate_with_logging,
};
use crate::engine::utils::fs::write_json_pretty;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

const STAGE: &str = "frequency";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubStageStatus {
    pub status: String,
    pub skip_reason: Option<String>,
}

/// The frequency payload document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyPayload {
    pub status: String,
    pub output_file: PathBuf,
    pub units: BTreeMap<&'static str, &'static str>,
    pub versions: BTreeMap<&'static str, Option<String>>,
    pub basis: String,
    pub xc: String,
    pub scf: Option<Value>,
    pub solvent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solvent_model: Option<String>,
    pub solvent_eps: Option<f64>,
    pub dispersion: Option<String>,
    pub dispersion_mode: FrequencyDispersionMode,
    pub dispersion_step: Option<f64>,
    pub profiling: Option<Value>,
    pub thermochemistry: Option<Value>,
    pub results: FrequencyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_point: Option<SubStageStatus>,
}

impl FrequencyPayload {
    fn new(context: &StageContext, backend: &dyn ComputeBackend, result: FrequencyResult) -> Self {
        let calc = &context.calculation;
        let units = BTreeMap::from([
            ("energy", "hartree"),
            ("frequencies_wavenumber", "cm^-1"),
            ("zpe", "hartree"),
            ("enthalpy", "hartree"),
            ("entropy", "hartree/K"),
            ("gibbs_free_energy", "hartree"),
            ("temperature", "K"),
            ("pressure", "Pa"),
        ]);
        let versions = BTreeMap::from([
            ("dftflow", Some(env!("CARGO_PKG_VERSION").to_string())),
            ("backend", Some(backend.name().to_string())),
            ("backend_version", backend.version()),
        ]);
        Self {
            status: StageState::Completed.label().to_string(),
            output_file: context.paths.frequency_output_path.clone(),
            units,
            versions,
            basis: calc.basis.clone(),
            xc: calc.xc.clone(),
            scf: calc.scf.clone(),
            solvent: calc.solvent_name.clone(),
            solvent_model: calc.effective_solvent_model().map(str::to_string),
            solvent_eps: calc.solvent_eps,
            dispersion: calc.dispersion_model.clone(),
            dispersion_mode: calc.freq_dispersion_mode,
            dispersion_step: calc.freq_dispersion_step,
            profiling: result.profiling.clone(),
            thermochemistry: thermochemistry_payload(calc.thermo.as_ref(), result.thermochemistry.as_ref()),
            results: result,
            single_point: None,
        }
    }

    fn write(&self) -> Result<(), EngineError> {
        write_json_pretty(&self.output_file, self).map_err(|e| EngineError::io(&self.output_file, e))
    }
}

/// Combines the requested thermochemistry settings with the computed values.
fn thermochemistry_payload(settings: Option<&Value>, computed: Option<&Value>) -> Option<Value> {
    match (settings, computed) {
        (None, None) => None,
        (settings, computed) => Some(json!({
            "settings": settings,
            "results": computed,
        })),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyOutcome {
    pub payload: FrequencyPayload,
    pub irc: StageState,
    pub irc_payload: Option<IrcPayload>,
    pub single_point: SinglePointOutcome,
    pub metadata: RunMetadata,
}

/// Runs the frequency stage as the owner of the run and finalizes exactly once.
#[instrument(skip_all, name = "frequency_stage", fields(run_id = %context.run_id))]
pub fn run(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    mut metadata: RunMetadata,
    finalizer: MetadataFinalizer<'_>,
    reporter: &ProgressReporter,
) -> Result<FrequencyOutcome, EngineError> {
    match execute(context, backend, &mut metadata, reporter) {
        Ok(stages) => {
            let metadata = finalizer.finalize(metadata, RunOutcome::Completed)?;
            Ok(FrequencyOutcome {
                payload: stages.payload,
                irc: stages.irc,
                irc_payload: stages.irc_payload,
                single_point: stages.single_point,
                metadata,
            })
        }
        Err(e) => {
            error!(error = %e, "Calculation failed.");
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

struct StageResults {
    payload: FrequencyPayload,
    irc: StageState,
    irc_payload: Option<IrcPayload>,
    single_point: SinglePointOutcome,
}

fn log_quality_messages(result: &FrequencyResult) {
    if let Some(check) = &result.imaginary_check {
        if let Some(message) = &check.message {
            if check.status.as_deref() == Some("one_imaginary") {
                info!("Imaginary frequency check: {}", message);
            } else {
                warn!("Imaginary frequency check: {}", message);
            }
        }
    }
    if let Some(quality) = &result.ts_quality {
        if let Some(message) = &quality.message {
            match quality.status.as_deref() {
                Some("pass") | Some("warn") => info!("TS quality check: {}", message),
                _ => warn!("TS quality check: {}", message),
            }
        }
    }
}

fn execute(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    metadata: &mut RunMetadata,
    reporter: &ProgressReporter,
) -> Result<StageResults, EngineError> {
    // === Phase 1: Frequency analysis ===
    reporter.report(Progress::PhaseStart { name: "Frequency" });
    info!("Starting frequency calculation.");
    let result = backend.frequencies(context)?;
    log_quality_messages(&result);

    let energy = result.energy;
    let scf_converged = result.converged;
    let scf_cycles = result.cycles;
    let imaginary_count = result.imaginary_count;
    let quality = result.ts_quality.clone().unwrap_or_default();

    let mut payload = FrequencyPayload::new(context, backend, result);
    payload.write()?;
    metadata.frequency = Some(serde_json::to_value(&payload)?);
    metadata.dispersion_info = payload.results.dispersion.clone();
    if let Some(profiling) = &payload.results.profiling {
        metadata.record_profiling(STAGE, profiling.clone());
    }

    let store = CheckpointStore::new(context.paths.checkpoint_path.clone());
    store.update_scf(&ScfCheckpoint {
        chkfile: context.paths.scf_chkfile.clone(),
        energy,
        converged: scf_converged,
    })?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Gate downstream stages ===
    let (irc_decision, sp_decision) = gate_downstream(context, imaginary_count, &quality);
    let mut irc_state = irc_decision.initial_state();
    let sp_state = sp_decision.initial_state();

    metadata.single_point = Some(SinglePointRecord {
        status: sp_state.label().to_string(),
        skip_reason: sp_state.skip_reason().map(str::to_string),
        ..Default::default()
    });
    metadata.irc = Some(serde_json::to_value(StageRecord {
        status: irc_state.label().to_string(),
        skip_reason: irc_state.skip_reason().map(str::to_string),
        output_file: Some(context.paths.irc_output_path.clone()),
        error: None,
    })?);
    payload.single_point = Some(SubStageStatus {
        status: sp_state.label().to_string(),
        skip_reason: sp_state.skip_reason().map(str::to_string),
    });
    payload.write()?;
    metadata.frequency = Some(serde_json::to_value(&payload)?);

    // === Phase 3: Deferred reaction-path trace ===
    let mut irc_payload = None;
    if irc_decision.proceeds() {
        info!("Running IRC for frequency geometry.");
        let (state, trace_payload) = run_deferred_irc(context, backend, metadata, reporter)?;
        irc_state = state;
        irc_payload = Some(trace_payload);
    } else {
        info!("Skipping IRC calculation.");
    }

    // === Phase 4: Single-point refinement ===
    let single_point = match sp_decision {
        GateDecision::Proceed { .. } => {
            info!("Calculating single-point energy after frequency.");
            single_point::refine(context, backend, &context.geometry, &store, reporter)?
        }
        GateDecision::Skip(reason) => SinglePointOutcome::skipped(reason),
    };
    metadata.single_point = Some(single_point.record());

    // === Phase 5: Summary ===
    metadata.summary = Some(summarize(
        context,
        energy,
        scf_converged,
        scf_cycles,
        single_point.result.as_ref(),
    ));

    Ok(StageResults {
        payload,
        irc: irc_state,
        irc_payload,
        single_point,
    })
}

fn gate_downstream(
    context: &StageContext,
    imaginary_count: Option<u32>,
    quality: &TsQualityResult,
) -> (GateDecision, GateDecision) {
    let enforce = context.ts_quality_enforced();
    let base = GateInputs {
        enabled: false,
        imaginary_count,
        optimizer_mode: context.optimizer_mode,
        enforce,
        allow: None,
        message: quality.message.as_deref(),
    };
    let irc = gate_with_logging(
        GateTarget::ReactionPath,
        &GateInputs {
            enabled: context.features.irc_enabled,
            allow: quality.allow_irc,
            ..base.clone()
        },
    );
    let sp = gate_with_logging(
        GateTarget::SinglePoint,
        &GateInputs {
            enabled: context.features.single_point_enabled,
            allow: quality.allow_single_point,
            ..base
        },
    );
    (irc, sp)
}

/// Computes the mode and traces the path. Failures are recorded in the IRC
/// payload and do not fail the frequency run.
fn run_deferred_irc(
    context: &StageContext,
    backend: &dyn ComputeBackend,
    metadata: &mut RunMetadata,
    reporter: &ProgressReporter,
) -> Result<(StageState, IrcPayload), EngineError> {
    let settings = context.irc;
    let running = StageState::NotStarted.transition(irc::STAGE, StageEvent::Start)?;
    let attempt = backend
        .imaginary_mode(context, &context.geometry)
        .and_then(|mode| {
            if mode.eigenvalue >= 0.0 {
                warn!(
                    eigenvalue = mode.eigenvalue,
                    "IRC mode eigenvalue is non-negative; structure may not be a first-order saddle point."
                );
            }
            irc::trace(context, backend, &mode, settings, None, metadata, reporter)
        });

    match attempt {
        Ok(payload) => Ok((running.transition(irc::STAGE, StageEvent::Complete)?, payload)),
        Err(e) => {
            error!(error = %e, "IRC calculation failed.");
            let payload = irc::record_failure(context, settings, &e, metadata);
            let state = running.transition(irc::STAGE, StageEvent::Fail(e.to_string()))?;
            Ok((state, payload))
        }
    }
}

fn summarize(
    context: &StageContext,
    energy: Option<f64>,
    scf_converged: Option<bool>,
    scf_cycles: Option<u32>,
    sp: Option<&crate::engine::backend::SinglePointResult>,
) -> RunSummary {
    let mut summary = RunSummary {
        elapsed_seconds: context.elapsed_seconds(),
        n_steps: scf_cycles.map(u64::from),
        final_energy: energy,
        opt_final_energy: energy,
        final_sp_energy: energy,
        final_sp_converged: scf_converged,
        final_sp_cycles: scf_cycles,
        scf_converged,
        opt_converged: None,
        converged: scf_converged.unwrap_or(true),
        memory_limit_enforced: context.memory_limit_enforced,
    };
    if let Some(sp) = sp {
        summary.final_sp_energy = Some(sp.energy);
        summary.final_sp_converged = Some(sp.converged);
        summary.final_sp_cycles = sp.cycles.or(scf_cycles);
        summary.final_energy = Some(sp.energy);
        summary.scf_converged = Some(sp.converged);
        summary.converged = sp.converged;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermochemistry_payload_is_absent_only_when_both_sides_are() {
        assert_eq!(thermochemistry_payload(None, None), None);
        let payload = thermochemistry_payload(Some(&json!({"T": 298.15})), None).unwrap();
        assert_eq!(payload["settings"]["T"], 298.15);
        assert!(payload["results"].is_null());
    }
}
