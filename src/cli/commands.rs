// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `inspect`
// and all their configurable flags.
//
// The short flags (-d, -t, -k, -n, -s, -b, -o, -l) follow
// the usual behavioral-cloning training script so existing
// invocations keep working.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the steering model on a driving dataset
    Train(TrainArgs),

    /// Resolve and split a dataset without training
    Inspect(InspectArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Data directory (driving_log.csv, or Forward/Left/Right image folders)
    #[arg(short = 'd', long, default_value = "data")]
    pub data_dir: String,

    /// Fraction of samples held out for validation
    #[arg(short = 't', long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Probability that an activation is kept by dropout
    #[arg(short = 'k', long, default_value_t = 0.5)]
    pub keep_prob: f64,

    /// Number of epochs
    #[arg(short = 'n', long, default_value_t = 10)]
    pub nb_epoch: usize,

    /// Samples per epoch (reported only)
    #[arg(short = 's', long, default_value_t = 20000)]
    pub samples_per_epoch: usize,

    #[arg(short = 'b', long, default_value_t = 40)]
    pub batch_size: usize,

    /// Save only when validation loss improves (true/yes/y/1)
    #[arg(
        short = 'o',
        long,
        default_value = "true",
        value_parser = parse_flag,
        action = clap::ArgAction::Set
    )]
    pub save_best_only: bool,

    #[arg(short = 'l', long, default_value_t = 1.0e-4)]
    pub learning_rate: f64,

    /// Seed for the split, weight init and batch sampling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Directory for the checkpoint, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

/// Any of true/yes/y/1 (case-insensitive) is true; everything else is false.
pub fn parse_flag(s: &str) -> Result<bool, String> {
    let s = s.to_lowercase();
    Ok(matches!(s.as_str(), "true" | "yes" | "y" | "1"))
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:          a.data_dir,
            test_size:         a.test_size,
            keep_prob:         a.keep_prob,
            nb_epoch:          a.nb_epoch,
            samples_per_epoch: a.samples_per_epoch,
            batch_size:        a.batch_size,
            save_best_only:    a.save_best_only,
            learning_rate:     a.learning_rate,
            seed:              a.seed,
            checkpoint_dir:    a.checkpoint_dir,
        }
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(short = 'd', long, default_value = "data")]
    pub data_dir: String,

    #[arg(short = 't', long, default_value_t = 0.2)]
    pub test_size: f64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}
