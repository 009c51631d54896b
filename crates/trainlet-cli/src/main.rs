//! trainlet CLI
//!
//! Command-line interface for validating, submitting, and launching jobs.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// trainlet - job descriptor and launcher for GPU training on SLURM
#[derive(Parser, Debug)]
#[command(name = "trainlet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options controlling how jobs are handed to SLURM
#[derive(clap::Args, Debug)]
struct SubmitOptions {
    /// Path to sbatch
    #[arg(long, default_value = "sbatch")]
    sbatch: PathBuf,

    /// Directory for generated scripts, specs, and launcher logs
    #[arg(long, default_value = ".trainlet")]
    spool_dir: PathBuf,

    /// Launcher run inside the allocation (defaults to this binary)
    #[arg(long)]
    launcher: Option<PathBuf>,

    /// Extra argument passed to sbatch (repeatable)
    #[arg(long = "sbatch-arg", allow_hyphen_values = true)]
    sbatch_args: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a job file without submitting it
    Validate {
        /// Job file (TOML)
        job: PathBuf,
    },

    /// Print the batch script a job file would be submitted with
    Render {
        /// Job file (TOML)
        job: PathBuf,

        #[command(flatten)]
        options: SubmitOptions,
    },

    /// Submit a job file to SLURM
    Submit {
        /// Job file (TOML)
        job: PathBuf,

        /// Print the job handle as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: SubmitOptions,
    },

    /// Prepare the environment and run a job file in the foreground
    Run {
        /// Job file (TOML)
        job: PathBuf,
    },

    /// Run a submitted job spec inside its allocation
    #[command(hide = true)]
    Launch {
        /// Job spec (JSON) written at submission
        #[arg(long)]
        spec: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_level.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Validate { job } => {
            commands::validate(&job)?;
        }
        Commands::Render { job, options } => {
            commands::render(&job, &options.into())?;
        }
        Commands::Submit { job, json, options } => {
            commands::submit(&job, &options.into(), json).await?;
        }
        Commands::Run { job } => {
            let status = commands::run(&job).await?;
            if !status.success() {
                std::process::exit(status.shell_code());
            }
        }
        Commands::Launch { spec } => {
            let status = commands::launch(&spec).await?;
            if !status.success() {
                std::process::exit(status.shell_code());
            }
        }
    }

    Ok(())
}

impl From<SubmitOptions> for trainlet_scheduler::SlurmSchedulerConfig {
    fn from(options: SubmitOptions) -> Self {
        let launcher_path = options.launcher.unwrap_or_else(|| {
            std::env::current_exe().unwrap_or_else(|_| PathBuf::from("trainlet"))
        });
        Self {
            sbatch_path: options.sbatch,
            spool_dir: options.spool_dir,
            launcher_path,
            extra_args: options.sbatch_args,
        }
    }
}
