//! trainlet-runtime: Delegated program launcher
//!
//! This crate runs the program a job delegates to:
//! - Process-based runtime with an explicit environment and file-backed stdio
//! - The validate → prepare → launch driver used inside an allocation

pub mod launcher;
pub mod process;
pub mod traits;

pub use launcher::{run_job, run_job_with};
pub use process::{ProcessRuntime, ProcessRuntimeConfig};
pub use traits::{LaunchRequest, Runtime};
