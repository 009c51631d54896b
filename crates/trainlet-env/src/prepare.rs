//! Environment preparation: modules in order, then virtualenv, then overrides

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use trainlet_core::{JobSpec, ModuleSystemConfig, TrainletResult};

use crate::catalog::CatalogModuleSystem;
use crate::delta::EnvVars;
use crate::shell::{ShellModuleSystem, ShellModuleSystemConfig};
use crate::traits::ModuleSystem;
use crate::virtualenv::VirtualEnv;

/// The exact environment the delegated program will see
///
/// Immutable once prepared. Built from an explicit base rather than the
/// process environment, so preparing never changes the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEnvironment {
    vars: EnvVars,
    activated: Vec<String>,
}

impl PreparedEnvironment {
    /// Wrap a fixed set of variables with nothing activated
    pub fn from_vars(vars: EnvVars) -> Self {
        Self {
            vars,
            activated: Vec::new(),
        }
    }

    pub fn vars(&self) -> &EnvVars {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Modules (and virtualenv) activated, in activation order
    pub fn activated(&self) -> &[String] {
        &self.activated
    }
}

/// Activate `modules` in order, then the virtualenv, then apply `overrides`
///
/// Stops at the first module that fails and returns its error; later modules
/// are not attempted and nothing is rolled back.
pub async fn prepare_environment(
    system: &dyn ModuleSystem,
    base: EnvVars,
    modules: &[String],
    virtualenv: Option<&VirtualEnv>,
    overrides: &EnvVars,
) -> TrainletResult<PreparedEnvironment> {
    let mut vars = base;
    let mut activated = Vec::with_capacity(modules.len() + 1);

    for module in modules {
        debug!(module = %module, system = system.name(), "Activating module");
        let delta = system.activate(module, &vars).await.map_err(|e| {
            error!(module = %module, error = %e, "Module activation failed");
            e
        })?;
        if delta.is_empty() {
            debug!(module = %module, "Module made no environment changes");
        }
        delta.apply(&mut vars);
        activated.push(module.clone());
    }

    if let Some(venv) = virtualenv {
        venv.activate().await?.apply(&mut vars);
        activated.push(venv.label());
    }

    for (name, value) in overrides {
        vars.insert(name.clone(), value.clone());
    }

    info!(
        modules = activated.len(),
        overrides = overrides.len(),
        variables = vars.len(),
        "Environment prepared"
    );

    Ok(PreparedEnvironment { vars, activated })
}

/// Build the module system a job asks for
pub fn module_system_for(config: &ModuleSystemConfig) -> Box<dyn ModuleSystem> {
    match config {
        ModuleSystemConfig::Shell { init } => Box::new(ShellModuleSystem::new(
            ShellModuleSystemConfig {
                init: init.clone(),
                ..Default::default()
            },
        )),
        ModuleSystemConfig::Catalog { modules } => {
            Box::new(CatalogModuleSystem::new(modules.clone()))
        }
    }
}

/// Snapshot of the invoking process's environment, or nothing
///
/// Variables whose name or value is not valid UTF-8 are left out.
pub fn base_environment(inherit: bool) -> EnvVars {
    if inherit {
        collect_environment(std::env::vars_os())
    } else {
        EnvVars::new()
    }
}

fn collect_environment(vars: impl IntoIterator<Item = (OsString, OsString)>) -> EnvVars {
    let mut env = EnvVars::new();
    for (name, value) in vars {
        match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => {
                env.insert(name, value);
            }
            (name, _) => {
                let name = name.unwrap_or_else(|n| n.to_string_lossy().into_owned());
                warn!(variable = %name, "Skipping non-UTF-8 environment variable");
            }
        }
    }
    env
}

/// Resolve a relative virtualenv path against the job's working directory
fn resolve_virtualenv(path: &Path, workdir: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match workdir {
        Some(dir) => dir.join(path),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Prepare the environment described by a job spec
pub async fn prepare_for_job(spec: &JobSpec) -> TrainletResult<PreparedEnvironment> {
    let system = module_system_for(&spec.module_system);
    prepare_for_job_with(spec, system.as_ref()).await
}

/// Prepare a job's environment with an explicit module system
pub async fn prepare_for_job_with(
    spec: &JobSpec,
    system: &dyn ModuleSystem,
) -> TrainletResult<PreparedEnvironment> {
    let venv = spec
        .virtualenv
        .as_deref()
        .map(|p| VirtualEnv::new(resolve_virtualenv(p, spec.workdir.as_deref())));

    prepare_environment(
        system,
        base_environment(spec.inherit_environment),
        &spec.modules,
        venv.as_ref(),
        &spec.environment,
    )
    .await
}
