//! Scheduler trait and validated submission

use async_trait::async_trait;
use tracing::{info, warn};
use trainlet_core::{JobHandle, JobSpec, TrainletResult};

/// A scheduler that accepts jobs for later execution
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Hand an already validated spec to the scheduler
    async fn schedule(&self, spec: &JobSpec) -> TrainletResult<JobHandle>;

    /// Get the scheduler name
    fn name(&self) -> &'static str;
}

/// Validate `spec` and submit it
///
/// Invalid specs fail with a configuration error before the scheduler is
/// contacted. The job is not run here.
pub async fn submit(scheduler: &dyn Scheduler, spec: &JobSpec) -> TrainletResult<JobHandle> {
    if let Err(e) = spec.validate() {
        warn!(job = %spec.name, error = %e, "Rejected job spec");
        return Err(e);
    }

    info!(
        job = %spec.name,
        partition = %spec.partition,
        nodes = spec.node_count,
        tasks = spec.task_count,
        gpus = spec.gpu_count,
        time = %spec.time_limit,
        scheduler = scheduler.name(),
        "Submitting job"
    );

    let handle = scheduler.schedule(spec).await?;

    info!(job = %spec.name, handle = %handle, "Job accepted");
    Ok(handle)
}
