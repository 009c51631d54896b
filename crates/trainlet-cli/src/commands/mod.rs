//! CLI commands implementation

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use trainlet_core::{ExitStatus, JobFile, JobSpec};
use trainlet_runtime::{run_job, ProcessRuntime};
use trainlet_scheduler::{submit as submit_job, SlurmScheduler, SlurmSchedulerConfig};

/// Load a job file into a spec
pub fn load_job(path: &Path) -> Result<JobSpec> {
    let spec = JobFile::from_file(path)?
        .into_spec()
        .with_context(|| format!("invalid job file {}", path.display()))?;
    Ok(spec)
}

/// Load a spec written at submission time
pub fn load_spec(path: &Path) -> Result<JobSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read job spec {}", path.display()))?;
    let spec = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse job spec {}", path.display()))?;
    Ok(spec)
}

/// Check a job file
pub fn validate(path: &Path) -> Result<()> {
    let spec = load_job(path)?;
    spec.validate()?;

    println!("Job '{}' is valid", spec.name);
    print_job_details(&spec);

    Ok(())
}

/// Print the batch script `submit` would write for a job file
///
/// Nothing is written; the spool file stem changes on every submission.
pub fn render(path: &Path, config: &SlurmSchedulerConfig) -> Result<()> {
    print!("{}", render_script(path, config)?);
    Ok(())
}

fn render_script(path: &Path, config: &SlurmSchedulerConfig) -> Result<String> {
    let spec = load_job(path)?;
    spec.validate()?;

    let (_, script) = SlurmScheduler::new(config.clone()).plan(&spec)?;
    Ok(script)
}

/// Submit a job file to SLURM
pub async fn submit(path: &Path, config: &SlurmSchedulerConfig, json: bool) -> Result<()> {
    let spec = load_job(path)?;
    let scheduler = SlurmScheduler::new(config.clone());

    let handle = submit_job(&scheduler, &spec).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&handle)?);
    } else {
        println!("Job '{}' submitted", spec.name);
        println!("  Job ID: {}", handle.job_id);
        println!("  Scheduler: {}", handle.scheduler);
        println!("  Submitted: {}", handle.submitted_at.to_rfc3339());
        println!("  Output: {}", spec.stdout_path.display());
        println!("  Errors: {}", spec.stderr_path.display());
    }

    Ok(())
}

/// Run a job file in the foreground
pub async fn run(path: &Path) -> Result<ExitStatus> {
    let spec = load_job(path)?;
    execute(&spec).await
}

/// Run a submitted spec inside its allocation
pub async fn launch(path: &Path) -> Result<ExitStatus> {
    let spec = load_spec(path)?;
    execute(&spec).await
}

async fn execute(spec: &JobSpec) -> Result<ExitStatus> {
    let status = run_job(spec, &ProcessRuntime::default()).await?;
    info!(job = %spec.name, status = %status, "Exiting with program status");
    Ok(status)
}

/// Helper to print job details
fn print_job_details(spec: &JobSpec) {
    println!("  Partition: {}", spec.partition);
    println!("  Nodes/Tasks: {}/{}", spec.node_count, spec.task_count);
    println!("  GPUs: {}", spec.gpu_count);
    println!("  Memory: {}M", spec.memory_mb);
    println!("  Time: {}", spec.time_limit);
    if let Some(constraint) = &spec.constraint {
        println!("  Constraint: {}", constraint);
    }
    if !spec.modules.is_empty() {
        println!("  Modules: {}", spec.modules.join(" "));
    }
    if let Some(venv) = &spec.virtualenv {
        println!("  Virtualenv: {}", venv.display());
    }
    for (name, value) in &spec.environment {
        println!("  {}={}", name, value);
    }
    println!("  Entry point: {}", spec.entry_point);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JOB: &str = r#"
entry_point = "echo ok"

[job]
name = "smoke"
partition = "debug"
time = "00:05"
memory_mb = 512
gpus = 4
"#;

    #[test]
    fn test_load_job_and_spec() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::File::create(&job_path)
            .unwrap()
            .write_all(JOB.as_bytes())
            .unwrap();

        let spec = load_job(&job_path).unwrap();
        assert_eq!(spec.name, "smoke");
        assert!(validate(&job_path).is_ok());

        let spec_path = dir.path().join("smoke.json");
        std::fs::write(&spec_path, serde_json::to_string(&spec).unwrap()).unwrap();
        assert_eq!(load_spec(&spec_path).unwrap(), spec);
    }

    #[tokio::test]
    async fn test_run_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        let out = dir.path().join("smoke.out");
        let err = dir.path().join("smoke.err");
        let content = format!(
            "{}stdout = '{}'\nstderr = '{}'\n",
            JOB,
            out.display(),
            err.display()
        );
        std::fs::write(&job_path, content).unwrap();

        let status = run(&job_path).await.unwrap();
        assert_eq!(status, ExitStatus::Code(0));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "ok\n");
    }

    #[test]
    fn test_render_matches_submitted_spool_layout() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(&job_path, JOB).unwrap();
        let spool = dir.path().join("spool");
        let config = SlurmSchedulerConfig {
            spool_dir: spool.clone(),
            launcher_path: "/opt/trainlet/bin/trainlet".into(),
            ..Default::default()
        };

        let script = render_script(&job_path, &config).unwrap();
        let prefix = format!(
            "exec /opt/trainlet/bin/trainlet launch --spec {}/smoke-",
            spool.display()
        );
        assert!(script.contains(&prefix), "{}", script);
        assert!(script.contains(&format!("--output={}/smoke-%j.log", spool.display())));
        assert!(!spool.exists());
    }

    #[test]
    fn test_validate_rejects_zero_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(&job_path, format!("{}nodes = 0\n", JOB)).unwrap();

        let err = validate(&job_path).unwrap_err();
        assert!(err.to_string().contains("nodeCount"));
    }
}
