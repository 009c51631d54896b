//! trainlet-scheduler: Job submission for trainlet
//!
//! This crate hands validated job specs to a cluster scheduler:
//! - The `Scheduler` seam and validated `submit`
//! - Batch script rendering
//! - SLURM submission via `sbatch`

pub mod scheduler;
pub mod script;
pub mod slurm;

pub use scheduler::{submit, Scheduler};
pub use script::{directives, render_batch_script};
pub use slurm::{parse_job_id, SlurmScheduler, SlurmSchedulerConfig, SpoolFiles};
