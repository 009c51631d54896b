//! SLURM submission through `sbatch`
//!
//! Each submission writes two files into the spool directory: the spec as
//! JSON and a batch script whose body execs `trainlet launch --spec <json>`.
//! The script is handed to `sbatch --parsable`, which prints the job id.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};
use trainlet_core::{JobHandle, JobSpec, TrainletError, TrainletResult};
use uuid::Uuid;

use crate::scheduler::Scheduler;
use crate::script::render_batch_script;

/// SLURM scheduler configuration
#[derive(Debug, Clone)]
pub struct SlurmSchedulerConfig {
    /// Path to the `sbatch` binary
    pub sbatch_path: PathBuf,
    /// Directory for generated scripts, specs, and launcher logs
    pub spool_dir: PathBuf,
    /// Launcher executed inside the allocation
    pub launcher_path: PathBuf,
    /// Additional arguments for `sbatch`
    pub extra_args: Vec<String>,
}

impl Default for SlurmSchedulerConfig {
    fn default() -> Self {
        Self {
            sbatch_path: PathBuf::from("sbatch"),
            spool_dir: PathBuf::from(".trainlet"),
            launcher_path: PathBuf::from("trainlet"),
            extra_args: Vec::new(),
        }
    }
}

/// Files written for one submission
#[derive(Debug, Clone)]
pub struct SpoolFiles {
    pub spec: PathBuf,
    pub script: PathBuf,
    pub log: PathBuf,
}

/// Scheduler submitting to SLURM with `sbatch`
pub struct SlurmScheduler {
    config: SlurmSchedulerConfig,
}

impl SlurmScheduler {
    /// Create a new SLURM scheduler
    pub fn new(config: SlurmSchedulerConfig) -> Self {
        Self { config }
    }

    /// Absolute spool directory; compute nodes may start elsewhere
    fn spool_dir(&self) -> TrainletResult<PathBuf> {
        if self.config.spool_dir.is_absolute() {
            Ok(self.config.spool_dir.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.config.spool_dir))
        }
    }

    /// Spool paths and batch script for `spec`, without touching the disk
    ///
    /// Each call picks a fresh file stem.
    pub fn plan(&self, spec: &JobSpec) -> TrainletResult<(SpoolFiles, String)> {
        let dir = self.spool_dir()?;

        let stem = format!("{}-{}", spec.name, Uuid::new_v4().simple());
        let files = SpoolFiles {
            spec: dir.join(format!("{}.json", stem)),
            script: dir.join(format!("{}.sbatch", stem)),
            // sbatch substitutes %j with the job id
            log: dir.join(format!("{}-%j.log", spec.name)),
        };

        let command = vec![
            self.config.launcher_path.to_string_lossy().into_owned(),
            "launch".to_string(),
            "--spec".to_string(),
            files.spec.to_string_lossy().into_owned(),
        ];
        let script = render_batch_script(spec, &command, &files.log);

        Ok((files, script))
    }

    /// Write the spec and batch script for `spec`
    pub async fn write_spool(&self, spec: &JobSpec) -> TrainletResult<SpoolFiles> {
        let (files, script) = self.plan(spec)?;
        if let Some(dir) = files.spec.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_string_pretty(spec)?;
        tokio::fs::write(&files.spec, json).await?;
        tokio::fs::write(&files.script, script).await?;

        debug!(
            spec = %files.spec.display(),
            script = %files.script.display(),
            "Wrote spool files"
        );

        Ok(files)
    }

    /// Build the `sbatch` invocation for a script
    fn build_command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(&self.config.sbatch_path);
        cmd.arg("--parsable");
        cmd.args(&self.config.extra_args);
        cmd.arg(script);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

/// Job id from `sbatch --parsable` output (`<id>` or `<id>;<cluster>`)
pub fn parse_job_id(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let id = line.split(';').next()?.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit() || c == '_') {
        Some(id.to_string())
    } else {
        None
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    async fn schedule(&self, spec: &JobSpec) -> TrainletResult<JobHandle> {
        let files = self.write_spool(spec).await?;
        let mut cmd = self.build_command(&files.script);

        debug!(?cmd, "Spawning sbatch");

        let output = cmd.output().await.map_err(|e| {
            error!(
                sbatch = %self.config.sbatch_path.display(),
                error = %e,
                "Failed to run sbatch"
            );
            TrainletError::Scheduler(format!(
                "Failed to run {}: {}",
                self.config.sbatch_path.display(),
                e
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            error!(status = %output.status, stderr = %stderr.trim(), "sbatch rejected job");
            return Err(TrainletError::Scheduler(format!(
                "sbatch exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let job_id = parse_job_id(&stdout).ok_or_else(|| {
            TrainletError::Scheduler(format!(
                "Could not parse job id from sbatch output: {:?}",
                stdout.trim()
            ))
        })?;

        info!(
            job_id = %job_id,
            script = %files.script.display(),
            log = %files.log.display(),
            "Job submitted to SLURM"
        );

        Ok(JobHandle::new(self.name(), job_id))
    }

    fn name(&self) -> &'static str {
        "slurm"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::scheduler::submit;
    use std::os::unix::fs::PermissionsExt;
    use trainlet_core::EntryPoint;

    /// Install an executable fake `sbatch` running `body`
    fn fake_sbatch(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("sbatch");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn scheduler(dir: &Path, sbatch: PathBuf) -> SlurmScheduler {
        SlurmScheduler::new(SlurmSchedulerConfig {
            sbatch_path: sbatch,
            spool_dir: dir.join("spool"),
            launcher_path: PathBuf::from("/opt/trainlet/bin/trainlet"),
            extra_args: vec!["--requeue".to_string()],
        })
    }

    fn spec() -> JobSpec {
        let mut spec = JobSpec::new("train", "gpu", EntryPoint::parse("echo ok"));
        spec.gpu_count = 4;
        spec
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("4242\n"), Some("4242".to_string()));
        assert_eq!(parse_job_id("\n4242;cluster\n"), Some("4242".to_string()));
        assert_eq!(parse_job_id("Submitted batch job 11"), None);
        assert_eq!(parse_job_id(""), None);
    }

    #[tokio::test]
    async fn test_slurm_submit() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let sbatch = fake_sbatch(
            dir.path(),
            &format!("echo \"$@\" > '{}'\necho '4242;cluster'", args_file.display()),
        );
        let scheduler = scheduler(dir.path(), sbatch);

        let handle = submit(&scheduler, &spec()).await.unwrap();
        assert_eq!(handle.scheduler, "slurm");
        assert_eq!(handle.job_id, "4242");

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert!(args.starts_with("--parsable --requeue "));
        let script_path = PathBuf::from(args.trim().rsplit(' ').next().unwrap());
        let script = std::fs::read_to_string(&script_path).unwrap();
        assert!(script.contains("#SBATCH --gres=gpu:4\n"));
        assert!(script.contains("exec /opt/trainlet/bin/trainlet launch --spec "));

        let json_path = script_path.with_extension("json");
        let stored: JobSpec =
            serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(stored, spec());
    }

    #[tokio::test]
    async fn test_sbatch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sbatch = fake_sbatch(
            dir.path(),
            "echo 'sbatch: error: invalid partition specified: gpu' >&2\nexit 1",
        );
        let scheduler = scheduler(dir.path(), sbatch);

        let err = submit(&scheduler, &spec()).await.unwrap_err();
        assert!(matches!(err, TrainletError::Scheduler(_)));
        assert!(err.to_string().contains("invalid partition"));
    }

    #[tokio::test]
    async fn test_unparsable_output() {
        let dir = tempfile::tempdir().unwrap();
        let sbatch = fake_sbatch(dir.path(), "echo 'Submitted batch job'");
        let scheduler = scheduler(dir.path(), sbatch);

        let err = submit(&scheduler, &spec()).await.unwrap_err();
        assert!(err.to_string().contains("Could not parse job id"));
    }

    #[test]
    fn test_plan_uses_absolute_spool_paths() {
        let scheduler = SlurmScheduler::new(SlurmSchedulerConfig {
            spool_dir: PathBuf::from("spool"),
            ..Default::default()
        });

        let (files, script) = scheduler.plan(&spec()).unwrap();
        assert!(files.spec.is_absolute());
        assert_eq!(files.spec.parent(), files.script.parent());
        assert!(files
            .spec
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("train-"));
        assert!(script.contains(&format!("--spec {}", files.spec.display())));
        assert!(!files.spec.exists());
    }

    #[tokio::test]
    async fn test_name_with_slash_rejected_before_spool() {
        let dir = tempfile::tempdir().unwrap();
        let sbatch = fake_sbatch(dir.path(), "echo 1");
        let scheduler = scheduler(dir.path(), sbatch);

        let mut bad = spec();
        bad.name = "gpt2/finetune".to_string();
        let err = submit(&scheduler, &bad).await.unwrap_err();

        assert_eq!(err.field(), Some("name"));
        assert!(!dir.path().join("spool").exists());
    }

    #[tokio::test]
    async fn test_invalid_spec_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sbatch = fake_sbatch(dir.path(), "exit 99");
        let scheduler = scheduler(dir.path(), sbatch);

        let mut bad = spec();
        bad.node_count = 0;
        let err = submit(&scheduler, &bad).await.unwrap_err();

        assert_eq!(err.field(), Some("nodeCount"));
        assert!(!dir.path().join("spool").exists());
    }
}
