//! Process-based runtime implementation
//!
//! Runs the delegated program as a direct child process. The child gets the
//! prepared environment and nothing else, and its stdout/stderr are attached
//! to the job's files for its whole lifetime.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::fs::File;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use trainlet_core::{ExitStatus, TrainletError, TrainletResult};
use trainlet_env::PreparedEnvironment;

use crate::traits::{LaunchRequest, Runtime};

/// Process-based runtime configuration
#[derive(Debug, Clone)]
pub struct ProcessRuntimeConfig {
    /// Create missing parent directories of the output files
    pub create_parent_dirs: bool,
}

impl Default for ProcessRuntimeConfig {
    fn default() -> Self {
        Self {
            create_parent_dirs: true,
        }
    }
}

/// Process-based runtime for the delegated program
#[derive(Debug, Clone, Default)]
pub struct ProcessRuntime {
    config: ProcessRuntimeConfig,
}

impl ProcessRuntime {
    /// Create a new process runtime
    pub fn new(config: ProcessRuntimeConfig) -> Self {
        Self { config }
    }

    /// Create (truncate) an output file
    async fn create_output(&self, path: &Path) -> TrainletResult<std::fs::File> {
        if self.config.create_parent_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TrainletError::Runtime(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(path).await.map_err(|e| {
            TrainletError::Runtime(format!(
                "Failed to create output file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(file.into_std().await)
    }

    /// Open stdout and stderr; one shared file when both paths are the same
    async fn open_outputs(&self, request: &LaunchRequest) -> TrainletResult<(Stdio, Stdio)> {
        let stdout = self.create_output(&request.stdout_path).await?;
        if request.stderr_path == request.stdout_path {
            let stderr = stdout.try_clone()?;
            return Ok((Stdio::from(stdout), Stdio::from(stderr)));
        }
        let stderr = self.create_output(&request.stderr_path).await?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    /// Build the command for the delegated program
    fn build_command(
        &self,
        request: &LaunchRequest,
        env: &PreparedEnvironment,
        stdout: Stdio,
        stderr: Stdio,
    ) -> Command {
        let mut cmd = Command::new(&request.entry_point.program);
        cmd.args(&request.entry_point.args);

        // Only the prepared environment is visible to the child
        cmd.env_clear();
        cmd.envs(env.vars());

        if let Some(dir) = &request.workdir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(stdout);
        cmd.stderr(stderr);

        cmd
    }
}

#[async_trait]
impl Runtime for ProcessRuntime {
    async fn launch(
        &self,
        request: &LaunchRequest,
        env: &PreparedEnvironment,
    ) -> TrainletResult<ExitStatus> {
        let (stdout, stderr) = self.open_outputs(request).await?;
        let mut cmd = self.build_command(request, env, stdout, stderr);

        info!(
            program = %request.entry_point.program,
            args = ?request.entry_point.args,
            stdout = %request.stdout_path.display(),
            stderr = %request.stderr_path.display(),
            "Launching program"
        );

        let mut child = cmd.spawn().map_err(|e| {
            error!(
                program = %request.entry_point.program,
                error = %e,
                "Failed to spawn program"
            );
            TrainletError::Runtime(format!(
                "Failed to spawn {}: {}",
                request.entry_point.program, e
            ))
        })?;

        // The command holds the parent's copies of the output handles
        drop(cmd);

        if let Some(pid) = child.id() {
            debug!(pid = pid, "Program spawned");
        }

        let status = child.wait().await.map_err(|e| {
            TrainletError::Runtime(format!(
                "Failed to wait for {}: {}",
                request.entry_point.program, e
            ))
        })?;
        let status = ExitStatus::from(status);

        if status.success() {
            info!(status = %status, "Program finished");
        } else {
            warn!(status = %status, "Program finished unsuccessfully");
        }

        Ok(status)
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
