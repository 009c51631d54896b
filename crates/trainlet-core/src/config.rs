//! Job file format (TOML) and module system configuration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::{EntryPoint, JobSpec, MailEvent, NotificationPolicy, TimeLimit, TrainletError};

/// Default variable naming the numerical backend
pub const DEFAULT_SELECTOR_VAR: &str = "BACKEND_SELECTOR";
/// Default variable carrying the backend runtime flags
pub const DEFAULT_FLAGS_VAR: &str = "BACKEND_FLAGS";

/// How modules are activated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleSystemConfig {
    /// Run `module load` in a bash subshell and capture the resulting environment
    Shell {
        /// Script sourced before `module load`; a login shell is used when unset
        #[serde(default)]
        init: Option<PathBuf>,
    },
    /// Modules defined inline as environment edits
    Catalog {
        #[serde(default)]
        modules: BTreeMap<String, ModuleDefinition>,
    },
}

impl Default for ModuleSystemConfig {
    fn default() -> Self {
        ModuleSystemConfig::Shell { init: None }
    }
}

/// Environment edits a catalog module applies when activated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub prepend_path: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub append_path: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub unset: Vec<String>,
}

/// Job file as written by users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    /// Resource request
    pub job: JobSettings,
    /// Mail notifications
    pub notify: Option<NotifySettings>,
    /// Modules, virtualenv, and variables
    pub environment: Option<EnvironmentSettings>,
    /// Numerical backend selection
    pub backend: Option<BackendSettings>,
    /// Program to run
    pub entry_point: Option<EntryPointSettings>,
    /// Catalog module definitions
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    pub name: Option<String>,
    pub partition: String,
    pub nodes: Option<u32>,
    pub tasks: Option<u32>,
    pub gpus: Option<u32>,
    pub cpus_per_task: Option<u32>,
    pub time: String,
    pub memory_mb: u64,
    pub constraint: Option<String>,
    pub account: Option<String>,
    pub workdir: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default)]
    pub events: Vec<MailEvent>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(default)]
    pub modules: Vec<String>,
    pub virtualenv: Option<PathBuf>,
    pub module_system: Option<ModuleSystemKind>,
    /// Script sourced before `module load` by the shell module system
    pub module_init: Option<PathBuf>,
    pub inherit: Option<bool>,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleSystemKind {
    Shell,
    Catalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub selector_var: Option<String>,
    pub selector: Option<String>,
    pub flags_var: Option<String>,
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

impl BackendSettings {
    /// Flags rendered as `key=value,key=value` in key order
    pub fn flags_string(&self) -> String {
        self.flags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Variables this backend section contributes
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        if let Some(selector) = &self.selector {
            let name = self
                .selector_var
                .clone()
                .unwrap_or_else(|| DEFAULT_SELECTOR_VAR.to_string());
            vars.insert(name, selector.clone());
        }
        if !self.flags.is_empty() {
            let name = self
                .flags_var
                .clone()
                .unwrap_or_else(|| DEFAULT_FLAGS_VAR.to_string());
            vars.insert(name, self.flags_string());
        }
        vars
    }
}

/// Either `entry_point = "cmd args"` or a `[entry_point]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPointSettings {
    Command(String),
    Program {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl From<EntryPointSettings> for EntryPoint {
    fn from(settings: EntryPointSettings) -> Self {
        match settings {
            EntryPointSettings::Command(command) => EntryPoint::parse(&command),
            EntryPointSettings::Program { program, args } => EntryPoint::new(program, args),
        }
    }
}

impl JobFile {
    /// Load a job file from disk
    pub fn from_file(path: &Path) -> Result<Self, TrainletError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainletError::ConfigFile(format!("Failed to read job file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, TrainletError> {
        toml::from_str(content)
            .map_err(|e| TrainletError::ConfigFile(format!("Failed to parse job file: {}", e)))
    }

    /// Resolve the file into an immutable job spec
    ///
    /// Does not validate; a zero count or empty entry point is carried through
    /// so that submission reports it with the field name.
    pub fn into_spec(self) -> Result<JobSpec, TrainletError> {
        let job = self.job;
        let name = job.name.unwrap_or_else(|| "trainlet".to_string());
        let time_limit: TimeLimit = job.time.parse()?;

        let notify = match self.notify {
            Some(n) => NotificationPolicy {
                events: n.events.into_iter().collect::<BTreeSet<_>>(),
                address: n.address,
            },
            None => NotificationPolicy::default(),
        };

        let env = self.environment.unwrap_or_default();
        let module_system = match env.module_system {
            Some(ModuleSystemKind::Catalog) => ModuleSystemConfig::Catalog {
                modules: self.modules,
            },
            Some(ModuleSystemKind::Shell) | None => ModuleSystemConfig::Shell {
                init: env.module_init,
            },
        };

        let mut environment = self
            .backend
            .as_ref()
            .map(BackendSettings::variables)
            .unwrap_or_default();
        environment.extend(env.vars);

        let entry_point = self
            .entry_point
            .map(EntryPoint::from)
            .unwrap_or_else(|| EntryPoint::new(String::new(), Vec::new()));

        Ok(JobSpec {
            stdout_path: job
                .stdout
                .unwrap_or_else(|| PathBuf::from(format!("{}.out", name))),
            stderr_path: job
                .stderr
                .unwrap_or_else(|| PathBuf::from(format!("{}.err", name))),
            name,
            partition: job.partition,
            node_count: job.nodes.unwrap_or(1),
            task_count: job.tasks.unwrap_or(1),
            gpu_count: job.gpus.unwrap_or(0),
            cpus_per_task: job.cpus_per_task,
            time_limit,
            memory_mb: job.memory_mb,
            constraint: job.constraint,
            account: job.account,
            workdir: job.workdir,
            notify,
            modules: env.modules,
            virtualenv: env.virtualenv,
            module_system,
            inherit_environment: env.inherit.unwrap_or(true),
            environment,
            entry_point,
        })
    }
}
