//! Validate → prepare → launch for a single job

use tracing::info;
use trainlet_core::{ExitStatus, JobSpec, TrainletResult};
use trainlet_env::{module_system_for, prepare_for_job_with, ModuleSystem};

use crate::traits::{LaunchRequest, Runtime};

/// Run a job in the current allocation using its configured module system
///
/// Configuration and environment errors abort before anything is launched.
/// Once the program runs, its exit status is returned as is, including
/// failures.
pub async fn run_job(spec: &JobSpec, runtime: &dyn Runtime) -> TrainletResult<ExitStatus> {
    let system = module_system_for(&spec.module_system);
    run_job_with(spec, system.as_ref(), runtime).await
}

/// Run a job with an explicit module system
pub async fn run_job_with(
    spec: &JobSpec,
    system: &dyn ModuleSystem,
    runtime: &dyn Runtime,
) -> TrainletResult<ExitStatus> {
    spec.validate()?;

    info!(
        job = %spec.name,
        modules = ?spec.modules,
        module_system = system.name(),
        runtime = runtime.name(),
        "Preparing job environment"
    );
    let env = prepare_for_job_with(spec, system).await?;

    let request = LaunchRequest::from_spec(spec);
    let status = runtime.launch(&request, &env).await?;

    info!(job = %spec.name, status = %status, "Job finished");
    Ok(status)
}
