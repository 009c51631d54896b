//! Runtime trait definitions

use async_trait::async_trait;
use std::path::PathBuf;
use trainlet_core::{EntryPoint, ExitStatus, JobSpec, TrainletResult};
use trainlet_env::PreparedEnvironment;

/// What to launch and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Program and arguments
    pub entry_point: EntryPoint,
    /// File receiving stdout, truncated at launch
    pub stdout_path: PathBuf,
    /// File receiving stderr, truncated at launch
    pub stderr_path: PathBuf,
    /// Working directory, the launcher's own when unset
    pub workdir: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            entry_point: spec.entry_point.clone(),
            stdout_path: spec.stdout_path.clone(),
            stderr_path: spec.stderr_path.clone(),
            workdir: spec.workdir.clone(),
        }
    }
}

/// Runtime trait for running the delegated program
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run the program with exactly `env` visible and wait for it to exit
    async fn launch(
        &self,
        request: &LaunchRequest,
        env: &PreparedEnvironment,
    ) -> TrainletResult<ExitStatus>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}
