use crate::cli::AssessArgs;
use crate::error::{CliError, Result};
use dftflow::engine::checkpoint::load_checkpoint;
use dftflow::engine::profile::{AssessmentStatus, assess_profile, write_profile_csv};
use tracing::{info, warn};

pub fn run(args: AssessArgs) -> Result<()> {
    if !args.checkpoint.exists() {
        return Err(CliError::Argument(format!(
            "Checkpoint file does not exist: {}",
            args.checkpoint.display()
        )));
    }
    info!("Loading profile from checkpoint {:?}", &args.checkpoint);
    let record = load_checkpoint(&args.checkpoint);
    let assessment = assess_profile(&record.irc_profile);

    match assessment.status {
        AssessmentStatus::Pass => info!("Profile assessment passed."),
        AssessmentStatus::Warn => warn!("{}", assessment.message),
        AssessmentStatus::Empty => warn!("Checkpoint holds no reaction-path profile."),
    }

    println!("Assessment: {}", assessment.message);
    if let Some(ts) = assessment.details.ts_energy_ev {
        println!("TS reference: {:.6} eV", ts);
    }
    for (direction, detail) in &assessment.details.directions {
        let drop = detail
            .endpoint_drop_from_ts_ev
            .map_or_else(|| "n/a".to_string(), |d| format!("{:.6} eV", d));
        println!(
            "  {:<8} {:<20} points {:>4}  endpoint step {:>4}  drop {}",
            direction.as_str(),
            detail.status.as_str(),
            detail.n_points,
            detail.endpoint_step,
            drop
        );
    }

    if let Some(output) = &args.output {
        write_profile_csv(output, &record.irc_profile, &assessment)?;
        println!("Profile export written to {}", output.display());
    }
    Ok(())
}
