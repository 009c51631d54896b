//! Job descriptor, handle, and exit status types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::{ModuleSystemConfig, TimeLimit, TrainletError, TrainletResult};

/// A single submission request
///
/// Built once from static configuration and never mutated afterwards. The
/// launcher consumes it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name shown by the scheduler
    pub name: String,
    /// Partition (resource pool) to submit to
    pub partition: String,
    /// Number of nodes
    pub node_count: u32,
    /// Number of tasks
    pub task_count: u32,
    /// Number of GPUs per node
    pub gpu_count: u32,
    /// CPUs per task, scheduler default when unset
    pub cpus_per_task: Option<u32>,
    /// Wall-clock limit
    pub time_limit: TimeLimit,
    /// Memory pool in megabytes
    pub memory_mb: u64,
    /// Hardware constraint tag (e.g. an accelerator driver version)
    pub constraint: Option<String>,
    /// Account to charge
    pub account: Option<String>,
    /// Working directory for the delegated program
    pub workdir: Option<PathBuf>,
    /// Where the delegated program's stdout goes
    pub stdout_path: PathBuf,
    /// Where the delegated program's stderr goes
    pub stderr_path: PathBuf,
    /// Lifecycle mail notifications
    pub notify: NotificationPolicy,
    /// Modules to activate, in order
    pub modules: Vec<String>,
    /// Virtualenv activated after all modules
    pub virtualenv: Option<PathBuf>,
    /// How modules are activated
    pub module_system: ModuleSystemConfig,
    /// Start from the invoker's environment instead of an empty one
    pub inherit_environment: bool,
    /// Variables applied on top of the module environment
    pub environment: BTreeMap<String, String>,
    /// Program to run
    pub entry_point: EntryPoint,
}

impl JobSpec {
    /// Create a spec with scheduler defaults around an entry point
    pub fn new(
        name: impl Into<String>,
        partition: impl Into<String>,
        entry_point: EntryPoint,
    ) -> Self {
        let name = name.into();
        Self {
            stdout_path: PathBuf::from(format!("{}.out", name)),
            stderr_path: PathBuf::from(format!("{}.err", name)),
            name,
            partition: partition.into(),
            node_count: 1,
            task_count: 1,
            gpu_count: 0,
            cpus_per_task: None,
            time_limit: TimeLimit::from_minutes(60),
            memory_mb: 1024,
            constraint: None,
            account: None,
            workdir: None,
            notify: NotificationPolicy::default(),
            modules: Vec::new(),
            virtualenv: None,
            module_system: ModuleSystemConfig::default(),
            inherit_environment: true,
            environment: BTreeMap::new(),
            entry_point,
        }
    }

    /// Check every field that must hold before anything is scheduled
    ///
    /// Returns the first offending field. The entry point is checked first.
    pub fn validate(&self) -> TrainletResult<()> {
        if self.entry_point.program.trim().is_empty() {
            return Err(TrainletError::configuration(
                "entryPoint",
                "program is missing or empty",
            ));
        }
        if self.name.is_empty() {
            return Err(TrainletError::configuration("name", "job name is empty"));
        }
        // the name becomes part of spool file names and the --job-name directive
        if self
            .name
            .chars()
            .any(|c| c == '/' || c.is_whitespace() || c.is_control())
        {
            return Err(TrainletError::configuration(
                "name",
                format!(
                    "invalid job name {:?}: must not contain '/', whitespace or control characters",
                    self.name
                ),
            ));
        }
        if self.node_count < 1 {
            return Err(TrainletError::configuration(
                "nodeCount",
                "must be at least 1",
            ));
        }
        if self.task_count < 1 {
            return Err(TrainletError::configuration(
                "taskCount",
                "must be at least 1",
            ));
        }
        if self.cpus_per_task == Some(0) {
            return Err(TrainletError::configuration(
                "cpusPerTask",
                "must be at least 1 when set",
            ));
        }
        if self.memory_mb == 0 {
            return Err(TrainletError::configuration(
                "memoryPoolMB",
                "must be positive",
            ));
        }
        if self.time_limit.is_zero() {
            return Err(TrainletError::configuration(
                "timeLimit",
                "must be positive",
            ));
        }
        if self.partition.trim().is_empty() {
            return Err(TrainletError::configuration(
                "resourcePool",
                "partition name is empty",
            ));
        }
        check_directive_value("resourcePool", &self.partition)?;
        if let Some(constraint) = &self.constraint {
            check_directive_value("constraint", constraint)?;
        }
        if let Some(account) = &self.account {
            check_directive_value("account", account)?;
        }
        if let Some(workdir) = &self.workdir {
            check_directive_value("workdir", &workdir.to_string_lossy())?;
        }
        if self.stdout_path.as_os_str().is_empty() {
            return Err(TrainletError::configuration("stdoutPath", "path is empty"));
        }
        if self.stderr_path.as_os_str().is_empty() {
            return Err(TrainletError::configuration("stderrPath", "path is empty"));
        }
        if !self.notify.events.is_empty() && self.notify.address.is_none() {
            return Err(TrainletError::configuration(
                "notificationPolicy",
                "events are set but no contact address is given",
            ));
        }
        if let Some(address) = &self.notify.address {
            check_directive_value("notificationPolicy", address)?;
        }
        for name in self.environment.keys() {
            if name.is_empty() || name.contains('=') || name.contains('\0') {
                return Err(TrainletError::configuration(
                    "runtimeEnvironment",
                    format!("invalid variable name '{}'", name),
                ));
            }
        }
        Ok(())
    }
}

/// Values rendered into `#SBATCH` lines must stay on a single line
fn check_directive_value(field: &str, value: &str) -> TrainletResult<()> {
    if value.chars().any(char::is_control) {
        return Err(TrainletError::configuration(
            field,
            format!("{:?} contains a newline or control character", value),
        ));
    }
    Ok(())
}

/// Program plus arguments handed control at launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl EntryPoint {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace; no shell quoting is interpreted
    pub fn parse(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
        }
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Lifecycle event that triggers a mail notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailEvent {
    Start,
    End,
    Fail,
    All,
}

impl MailEvent {
    /// SLURM `--mail-type` keyword
    pub fn slurm_name(&self) -> &'static str {
        match self {
            MailEvent::Start => "BEGIN",
            MailEvent::End => "END",
            MailEvent::Fail => "FAIL",
            MailEvent::All => "ALL",
        }
    }
}

impl fmt::Display for MailEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailEvent::Start => write!(f, "start"),
            MailEvent::End => write!(f, "end"),
            MailEvent::Fail => write!(f, "fail"),
            MailEvent::All => write!(f, "all"),
        }
    }
}

/// Events to notify about and the address to notify
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    #[serde(default)]
    pub events: BTreeSet<MailEvent>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NotificationPolicy {
    pub fn is_enabled(&self) -> bool {
        !self.events.is_empty() && self.address.is_some()
    }

    /// Comma-separated `--mail-type` value; `ALL` subsumes the rest
    pub fn mail_type(&self) -> String {
        if self.events.contains(&MailEvent::All) {
            return MailEvent::All.slurm_name().to_string();
        }
        self.events
            .iter()
            .map(MailEvent::slurm_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Opaque reference to a job accepted by a scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Scheduler that accepted the job
    pub scheduler: String,
    /// Scheduler-assigned job identifier
    pub job_id: String,
    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(scheduler: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            scheduler: scheduler.into(),
            job_id: job_id.into(),
            submitted_at: Utc::now(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheduler, self.job_id)
    }
}

/// How the delegated program terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    /// Exited with a code
    Code(i32),
    /// Killed by a signal
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }

    /// Code a shell would report: the exit code, or 128 + signal
    pub fn shell_code(&self) -> i32 {
        match self {
            ExitStatus::Code(code) => *code,
            ExitStatus::Signaled(signal) => 128 + signal,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signaled(signal);
            }
        }

        ExitStatus::Code(-1)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(signal) => write!(f, "signal {}", signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec::new("train", "gpu", EntryPoint::parse("python src/train.py"))
    }

    #[test]
    fn test_job_spec_new() {
        let spec = spec();
        assert_eq!(spec.node_count, 1);
        assert_eq!(spec.task_count, 1);
        assert_eq!(spec.stdout_path, PathBuf::from("train.out"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let mut s = spec();
        s.node_count = 0;
        assert_eq!(s.validate().unwrap_err().field(), Some("nodeCount"));

        let mut s = spec();
        s.task_count = 0;
        assert_eq!(s.validate().unwrap_err().field(), Some("taskCount"));

        let mut s = spec();
        s.memory_mb = 0;
        assert_eq!(s.validate().unwrap_err().field(), Some("memoryPoolMB"));
    }

    #[test]
    fn test_validate_reports_entry_point_first() {
        let mut s = spec();
        s.entry_point = EntryPoint::parse("   ");
        s.node_count = 0;
        assert_eq!(s.validate().unwrap_err().field(), Some("entryPoint"));
    }

    #[test]
    fn test_validate_gpu_count_may_be_zero() {
        let mut s = spec();
        s.gpu_count = 0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_notification_needs_address() {
        let mut s = spec();
        s.notify.events.insert(MailEvent::Fail);
        assert_eq!(
            s.validate().unwrap_err().field(),
            Some("notificationPolicy")
        );
        s.notify.address = Some("ops@example.org".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_environment_names() {
        let mut s = spec();
        s.environment.insert("A=B".to_string(), "x".to_string());
        assert_eq!(
            s.validate().unwrap_err().field(),
            Some("runtimeEnvironment")
        );
    }

    #[test]
    fn test_validate_job_name() {
        let invalid = [
            "",
            "gpt2/finetune",
            "../x",
            "two words",
            "x\ntouch /tmp/owned",
            "a\0b",
        ];
        for name in invalid {
            let mut s = spec();
            s.name = name.to_string();
            assert_eq!(s.validate().unwrap_err().field(), Some("name"), "name {:?}", name);
        }

        let mut s = spec();
        s.name = "gpt2-finetune_v2.1".to_string();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_newlines_in_directive_values() {
        let mut s = spec();
        s.partition = "gpu\n#SBATCH --partition=debug".to_string();
        assert_eq!(s.validate().unwrap_err().field(), Some("resourcePool"));

        let mut s = spec();
        s.constraint = Some("cuda75\nrm -rf /".to_string());
        assert_eq!(s.validate().unwrap_err().field(), Some("constraint"));

        let mut s = spec();
        s.account = Some("ml\r".to_string());
        assert_eq!(s.validate().unwrap_err().field(), Some("account"));

        let mut s = spec();
        s.workdir = Some(PathBuf::from("/scratch\n/x"));
        assert_eq!(s.validate().unwrap_err().field(), Some("workdir"));

        let mut s = spec();
        s.notify.events.insert(MailEvent::End);
        s.notify.address = Some("ops@example.org\ntouch /tmp/owned".to_string());
        assert_eq!(
            s.validate().unwrap_err().field(),
            Some("notificationPolicy")
        );
    }

    #[test]
    fn test_entry_point_parse() {
        let ep = EntryPoint::parse("echo  ok");
        assert_eq!(ep.program, "echo");
        assert_eq!(ep.args, vec!["ok".to_string()]);
        assert_eq!(ep.to_string(), "echo ok");
        assert!(EntryPoint::parse("").program.is_empty());
    }

    #[test]
    fn test_mail_type() {
        let mut policy = NotificationPolicy::default();
        policy.events.insert(MailEvent::Fail);
        policy.events.insert(MailEvent::Start);
        assert_eq!(policy.mail_type(), "BEGIN,FAIL");
        policy.events.insert(MailEvent::All);
        assert_eq!(policy.mail_type(), "ALL");
    }

    #[test]
    fn test_exit_status_shell_code() {
        assert!(ExitStatus::Code(0).success());
        assert_eq!(ExitStatus::Code(3).shell_code(), 3);
        assert_eq!(ExitStatus::Signaled(9).shell_code(), 137);
    }

    #[test]
    fn test_job_spec_json_roundtrip_keeps_time_limit() {
        let mut s = spec();
        s.time_limit = "1-00:00".parse().unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"1-00:00\""));
        let back: JobSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
