//! Module system driving `module load` in a bash subshell
//!
//! Each activation runs `module load <name>` in a fresh shell that starts from
//! the environment built so far, then captures the resulting environment with
//! `env -0` and returns the difference. Works with both Lmod and Environment
//! Modules since only the `module` shell function is used.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use trainlet_core::{shell_quote, TrainletError, TrainletResult};

use crate::delta::{parse_env_nul, EnvDelta, EnvVars};
use crate::traits::ModuleSystem;

/// Shell-based module system configuration
#[derive(Debug, Clone)]
pub struct ShellModuleSystemConfig {
    /// Shell used to run `module load`
    pub shell: PathBuf,
    /// Script sourced to define `module`; a login shell is used when unset
    pub init: Option<PathBuf>,
}

impl Default for ShellModuleSystemConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("bash"),
            init: None,
        }
    }
}

/// Module system that shells out to `module load`
pub struct ShellModuleSystem {
    config: ShellModuleSystemConfig,
}

impl ShellModuleSystem {
    /// Create a new shell module system
    pub fn new(config: ShellModuleSystemConfig) -> Self {
        Self { config }
    }

    /// Build the shell invocation loading `module`
    fn build_command(&self, module: &str, current: &EnvVars) -> Command {
        let mut cmd = Command::new(&self.config.shell);

        // module output goes to stderr so stdout carries only the environment
        let load = format!("module load {} 1>&2 && env -0", shell_quote(module));
        match &self.config.init {
            Some(init) => {
                let init = init.to_string_lossy();
                cmd.arg("--noprofile").arg("--norc").arg("-c").arg(format!(
                    ". {} >/dev/null 2>&1; {}",
                    shell_quote(&init),
                    load
                ));
            }
            None => {
                cmd.arg("-l").arg("-c").arg(load);
            }
        }

        cmd.env_clear();
        cmd.envs(current);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd
    }
}

#[async_trait]
impl ModuleSystem for ShellModuleSystem {
    async fn activate(&self, module: &str, current: &EnvVars) -> TrainletResult<EnvDelta> {
        let mut cmd = self.build_command(module, current);

        let output = cmd.output().await.map_err(|e| {
            TrainletError::environment(
                module,
                format!("failed to run {}: {}", self.config.shell.display(), e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .map(str::trim)
                .rev()
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("module load exited with {}", output.status));
            warn!(
                module = module,
                status = %output.status,
                "Module activation failed"
            );
            return Err(TrainletError::environment(module, reason));
        }

        let after = parse_env_nul(&output.stdout);
        if after.is_empty() {
            return Err(TrainletError::environment(
                module,
                "shell produced no environment",
            ));
        }

        let delta = EnvDelta::diff(current, &after);
        debug!(
            module = module,
            changes = delta.changes().len(),
            "Captured module environment"
        );

        Ok(delta)
    }

    fn name(&self) -> &'static str {
        "shell"
    }
}
