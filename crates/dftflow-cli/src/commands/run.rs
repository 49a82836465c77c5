use crate::cli::{RunArgs, StageKind};
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use dftflow::engine::{
    backend::ComputeBackend,
    context::StageContext,
    metadata::{MetadataFinalizer, QueueError, QueueUpdate, RunMetadata, RunQueue, RunSummary},
    progress::ProgressReporter,
    replay::ReplayBackend,
};
use dftflow::workflows;
use tracing::{info, warn};

/// Mirrors every status transition into the log.
struct LogQueue;

impl RunQueue for LogQueue {
    fn record_status(&self, update: &QueueUpdate<'_>) -> std::result::Result<(), QueueError> {
        info!(
            run_id = update.run_id,
            status = %update.status,
            exit_code = ?update.exit_code,
            "Run status changed."
        );
        Ok(())
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;
    let context = &app.context;

    info!("Loading recorded backend results from {:?}", &app.recording);
    let backend =
        ReplayBackend::from_path(&app.recording).map_err(|source| CliError::Recording {
            path: app.recording.clone(),
            source,
        })?;

    std::fs::create_dir_all(&context.paths.run_dir)?;
    let mut metadata = initial_metadata(context);

    let queue = LogQueue;
    let finalizer = MetadataFinalizer::new(context.paths.clone(), context.run_id.clone(), &queue);
    finalizer.mark_running(&mut metadata)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting {} stage for run '{}' in {}",
        stage_name(app.stage),
        context.run_id,
        context.paths.run_dir.display()
    );
    info!(backend = backend.name(), "Invoking the core workflow...");

    let (summary, energy_unit) = match app.stage {
        StageKind::Frequency => {
            let outcome =
                workflows::frequency::run(context, &backend, metadata, finalizer, &reporter)?;
            println!(
                "Frequency: {} imaginary mode(s); IRC {}; single point {}.",
                outcome
                    .payload
                    .results
                    .imaginary_count
                    .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
                outcome.irc.label(),
                outcome.single_point.state.label()
            );
            if let Some(reason) = outcome.irc.skip_reason() {
                println!("  IRC skipped: {}", reason);
            }
            if let Some(reason) = outcome.single_point.state.skip_reason() {
                println!("  Single point skipped: {}", reason);
            }
            (outcome.metadata.summary, "Eh")
        }
        StageKind::Irc => {
            let outcome = workflows::irc::run(context, &backend, metadata, finalizer, &reporter)?;
            println!(
                "IRC {} with {} profile point(s); single point {}.",
                outcome.payload.status,
                outcome.payload.profile.len(),
                outcome.single_point.state.label()
            );
            if let Some(assessment) = &outcome.payload.assessment {
                println!("  Profile assessment: {}", assessment.message);
            }
            (outcome.metadata.summary, "eV")
        }
    };

    print_summary(summary.as_ref(), energy_unit);
    println!(
        "Run metadata written to {}",
        context.paths.run_metadata_path.display()
    );
    Ok(())
}

/// A resumed run keeps its previous metadata document; a fresh run starts empty.
fn initial_metadata(context: &StageContext) -> RunMetadata {
    let path = &context.paths.run_metadata_path;
    if context.resume_dir.is_some() && path.exists() {
        match RunMetadata::load(path) {
            Ok(metadata) => return metadata,
            Err(e) => warn!("Ignoring unreadable run metadata {:?}: {}", path, e),
        }
    }
    RunMetadata::new(context.run_id.clone())
}

fn stage_name(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Frequency => "frequency",
        StageKind::Irc => "irc",
    }
}

fn print_summary(summary: Option<&RunSummary>, energy_unit: &str) {
    let Some(summary) = summary else {
        return;
    };
    match summary.final_energy {
        Some(energy) => println!("Final energy: {:.8} {}", energy, energy_unit),
        None => println!("Final energy: unavailable"),
    }
    if let Some(n_steps) = summary.n_steps {
        println!("Steps: {}", n_steps);
    }
    println!("Elapsed: {:.2}s", summary.elapsed_seconds);
}

