use crate::cli::{CheckpointArgs, CheckpointCommands};
use crate::error::{CliError, Result};
use dftflow::engine::checkpoint::{CheckpointRecord, load_checkpoint};
use dftflow::engine::direction::Direction;
use std::path::Path;
use tracing::info;

pub fn run(args: CheckpointArgs) -> Result<()> {
    match args.command {
        CheckpointCommands::Show { path, json } => show(&path, json),
    }
}

fn show(path: &Path, json: bool) -> Result<()> {
    info!("Loading checkpoint from {:?}", path);
    if !path.exists() {
        return Err(CliError::Argument(format!(
            "Checkpoint file does not exist: {}",
            path.display()
        )));
    }
    let record = load_checkpoint(path);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).map_err(|e| CliError::Other(e.into()))?
        );
        return Ok(());
    }

    for line in summarize(&record) {
        println!("{}", line);
    }
    Ok(())
}

fn summarize(record: &CheckpointRecord) -> Vec<String> {
    if record.is_empty() {
        return vec!["Checkpoint is empty or unreadable; a resumed run would start fresh.".to_string()];
    }

    let mut lines = vec![format!("Checkpoint version: {}", record.version)];
    if let Some(stage) = &record.last_stage {
        lines.push(format!("Last stage: {}", stage));
    }
    if let Some(step) = record.last_step {
        let direction = record
            .last_step_direction
            .map_or_else(String::new, |d| format!(" ({})", d));
        lines.push(format!("Last step: {}{}", step, direction));
    }
    for direction in Direction::ALL {
        let slot = record.direction(direction);
        let state = if slot.completed { "completed" } else { "partial" };
        let step = slot
            .step
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        lines.push(format!("IRC {:<8} {:<10} step {}", direction.as_str(), state, step));
    }
    lines.push(format!("Profile points: {}", record.irc_profile.len()));
    if let Some(energy) = record.scf.energy {
        let converged = record
            .scf
            .converged
            .map_or("unknown", |c| if c { "converged" } else { "not converged" });
        lines.push(format!("SCF energy: {:.8} Eh ({})", energy, converged));
    }
    lines
}
