mod common;

use common::*;
use dftflow::engine::backend::TsQualityResult;
use dftflow::engine::checkpoint::load_checkpoint;
use dftflow::engine::config::FeatureFlags;
use dftflow::engine::metadata::{RunMetadata, RunStatus};
use dftflow::engine::progress::ProgressReporter;
use dftflow::engine::replay::ReplayBackend;
use dftflow::engine::state::StageState;
use dftflow::workflows::frequency;
use tempfile::tempdir;

fn run(
    ctx: &dftflow::engine::context::StageContext,
    backend: &ReplayBackend,
) -> Result<frequency::FrequencyOutcome, dftflow::engine::error::EngineError> {
    let finalizer = noop_finalizer(ctx);
    let metadata = started_metadata(&finalizer);
    frequency::run(ctx, backend, metadata, finalizer, &ProgressReporter::new())
}

#[test]
fn matching_count_runs_trace_and_single_point() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), ContextOptions::default());
    let outcome = run(&ctx, &ReplayBackend::new(recording(5, 5))).unwrap();

    assert_eq!(outcome.irc, StageState::Completed);
    assert_eq!(outcome.single_point.state, StageState::Completed);
    assert_eq!(outcome.metadata.status, Some(RunStatus::Completed));

    let summary = outcome.metadata.summary.as_ref().unwrap();
    assert_eq!(summary.final_energy, Some(-139.62));
    assert_eq!(summary.opt_final_energy, Some(-139.5));
    assert_eq!(summary.final_sp_cycles, Some(11));

    let irc_payload = read_json(&ctx.paths.irc_output_path);
    assert_eq!(irc_payload["status"], "completed");
    assert_eq!(irc_payload["profile"].as_array().unwrap().len(), 12);

    let checkpoint = load_checkpoint(ctx.paths.checkpoint_path.as_ref().unwrap());
    assert_eq!(checkpoint.scf.energy, Some(-139.62));
    assert_eq!(checkpoint.scf.converged, Some(true));
}

#[test]
fn mismatch_without_enforcement_still_proceeds() {
    let dir = tempdir().unwrap();
    let ctx = context(
        dir.path(),
        ContextOptions {
            enforce: Some(false),
            ..Default::default()
        },
    );
    let backend = ReplayBackend::new(with_quality(recording(2, 2), TsQualityResult::default(), Some(3)));
    let outcome = run(&ctx, &backend).unwrap();

    let payload = read_json(&ctx.paths.frequency_output_path);
    assert_eq!(payload["single_point"]["status"], "pending");
    assert!(payload["single_point"]["skip_reason"].is_null());
    assert_eq!(outcome.irc, StageState::Completed);
    assert_eq!(outcome.single_point.state, StageState::Completed);
}

#[test]
fn enforced_disallow_skips_trace_with_reason() {
    let dir = tempdir().unwrap();
    let ctx = context(
        dir.path(),
        ContextOptions {
            enforce: Some(true),
            ..Default::default()
        },
    );
    let quality = TsQualityResult {
        status: Some("fail".to_string()),
        message: Some("Imaginary mode is a methyl rotation.".to_string()),
        allow_irc: Some(false),
        allow_single_point: Some(true),
    };
    let backend = ReplayBackend::new(with_quality(recording(2, 2), quality, Some(1)));
    let outcome = run(&ctx, &backend).unwrap();

    assert_eq!(
        outcome.irc,
        StageState::Gated("Imaginary mode is a methyl rotation.".to_string())
    );
    assert!(!ctx.paths.irc_output_path.exists());
    let irc = outcome.metadata.irc.as_ref().unwrap();
    assert_eq!(irc["status"], "skipped");
    assert!(irc["skip_reason"].is_string());
    assert_eq!(outcome.single_point.state, StageState::Completed);
}

#[test]
fn unavailable_count_with_enforcement_skips_both() {
    let dir = tempdir().unwrap();
    let ctx = context(
        dir.path(),
        ContextOptions {
            enforce: Some(true),
            ..Default::default()
        },
    );
    let backend = ReplayBackend::new(with_quality(recording(2, 2), TsQualityResult::default(), None));
    let outcome = run(&ctx, &backend).unwrap();

    assert_eq!(outcome.irc.skip_reason(), Some("Imaginary frequency count unavailable; skipping IRC."));
    assert_eq!(
        outcome.single_point.state.skip_reason(),
        Some("Imaginary frequency count unavailable.")
    );
    let summary = outcome.metadata.summary.unwrap();
    assert_eq!(summary.final_energy, Some(-139.5));
    assert_eq!(summary.n_steps, Some(14));
}

#[test]
fn disabled_stages_are_skipped() {
    let dir = tempdir().unwrap();
    let ctx = context(
        dir.path(),
        ContextOptions {
            features: FeatureFlags::default(),
            ..Default::default()
        },
    );
    let outcome = run(&ctx, &ReplayBackend::new(recording(2, 2))).unwrap();
    assert_eq!(outcome.irc.skip_reason(), Some("IRC calculation disabled."));
    assert_eq!(
        outcome.single_point.state.skip_reason(),
        Some("Single-point calculation disabled.")
    );
    assert_eq!(outcome.metadata.status, Some(RunStatus::Completed));
}

#[test]
fn trace_failure_is_recorded_without_failing_the_run() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), ContextOptions::default());
    let mut recording = recording(4, 4);
    recording.failures.imaginary_mode = Some("Hessian is singular".to_string());
    let outcome = run(&ctx, &ReplayBackend::new(recording)).unwrap();

    assert!(matches!(outcome.irc, StageState::Failed(_)));
    assert_eq!(outcome.metadata.status, Some(RunStatus::Completed));
    let irc_payload = read_json(&ctx.paths.irc_output_path);
    assert_eq!(irc_payload["status"], "failed");
    assert!(irc_payload["error"].as_str().unwrap().contains("Hessian is singular"));
    assert!(irc_payload["trace"].is_array());
    let recorded = outcome.metadata.irc.as_ref().unwrap();
    assert_eq!(recorded["status"], "failed");
    assert!(recorded["trace"].as_array().is_some_and(|t| !t.is_empty()));
    assert_eq!(outcome.single_point.state, StageState::Completed);
}

#[test]
fn frequency_failure_finalizes_failed_once() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), ContextOptions::default());
    let mut recording = recording(1, 1);
    recording.failures.frequency = Some("out of memory".to_string());
    let queue = CountingQueue::default();
    let finalizer = finalizer(&ctx, &queue);
    let metadata = started_metadata(&finalizer);

    let result = frequency::run(
        &ctx,
        &ReplayBackend::new(recording),
        metadata,
        finalizer,
        &ProgressReporter::new(),
    );
    assert!(result.is_err());
    assert_eq!(queue.terminal_count(), 1);
    assert_eq!(event_statuses(&ctx), vec!["running", "failed"]);
    let metadata = RunMetadata::load(&ctx.paths.run_metadata_path).unwrap();
    assert_eq!(metadata.error.as_deref(), Some("Backend failed during frequency: out of memory"));
}

#[test]
fn payload_omits_solvent_model_without_solvent() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), ContextOptions::default());
    run(&ctx, &ReplayBackend::new(recording(1, 1))).unwrap();

    let payload = read_json(&ctx.paths.frequency_output_path);
    assert!(payload.get("solvent_model").is_none());
    assert_eq!(payload["basis"], "def2-svp");
    assert_eq!(payload["results"]["imaginary_count"], 1);
    assert_eq!(payload["versions"]["backend"], "replay");
}
