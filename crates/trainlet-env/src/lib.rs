//! trainlet-env: Environment preparation for delegated programs
//!
//! This crate turns a job's module list, virtualenv, and variables into an
//! explicit `PreparedEnvironment`:
//! - Shell (`module load`) and catalog module systems
//! - Virtualenv activation
//! - Ordered, fail-fast preparation

pub mod catalog;
pub mod delta;
pub mod prepare;
pub mod shell;
pub mod traits;
pub mod virtualenv;

pub use catalog::CatalogModuleSystem;
pub use delta::{EnvChange, EnvDelta, EnvVars};
pub use prepare::{
    base_environment, module_system_for, prepare_environment, prepare_for_job,
    prepare_for_job_with, PreparedEnvironment,
};
pub use shell::{ShellModuleSystem, ShellModuleSystemConfig};
pub use traits::ModuleSystem;
pub use virtualenv::VirtualEnv;
