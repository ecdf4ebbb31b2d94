// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on clap.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   - fits the model and writes the checkpoint
//   2. `inspect` - reports dataset mode, split and angles
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InspectArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "behavioral-cloning",
    version,
    about = "Train a convolutional steering-angle model from driving images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(args.into());

    println!("{}", "-".repeat(30));
    println!("Parameters");
    println!("{}", "-".repeat(30));
    for (key, value) in use_case.config().parameters() {
        println!("{key:<20} := {value}");
    }
    println!("{}", "-".repeat(30));

    let report = use_case.execute().context("training run failed")?;

    match (&report.checkpoint, report.best_val_loss) {
        (Some(path), Some(best)) => {
            println!("Training complete. Best val_loss={best:.4}, checkpoint: {}", path.display());
        }
        (Some(path), None) => println!("Training complete. Checkpoint: {}", path.display()),
        (None, _) => println!("Training complete. No checkpoint was written."),
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    tracing::info!("Inspecting dataset in: {}", args.data_dir);

    let summary = InspectUseCase::new(&args.data_dir, args.test_size, args.seed)
        .summarize()
        .with_context(|| format!("cannot inspect dataset '{}'", args.data_dir))?;

    println!("mode        {}", summary.mode);
    println!("samples     {}", summary.total);
    println!("train       {}", summary.train);
    println!("validation  {}", summary.validation);
    if let Some(a) = summary.angles {
        println!("angle       min={:.4} max={:.4} mean={:.4}", a.min, a.max, a.mean);
    }
    Ok(())
}
