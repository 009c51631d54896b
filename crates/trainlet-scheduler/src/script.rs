//! Batch script rendering

use std::fmt::Write;
use std::path::Path;
use trainlet_core::{shell_quote, JobSpec};

/// Render an `sbatch` script for `spec` that execs `command` in the allocation
///
/// `log_path` receives the launcher's own output; the delegated program
/// writes to the spec's stdout/stderr paths.
pub fn render_batch_script(spec: &JobSpec, command: &[String], log_path: &Path) -> String {
    let mut script = String::from("#!/bin/bash\n");

    for directive in directives(spec, log_path) {
        let _ = writeln!(script, "#SBATCH {}", directive);
    }

    let command = command
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = write!(script, "\nexec {}\n", command);

    script
}

/// `sbatch` options for a spec, in a fixed order
pub fn directives(spec: &JobSpec, log_path: &Path) -> Vec<String> {
    let mut out = vec![
        format!("--job-name={}", spec.name),
        format!("--partition={}", spec.partition),
        format!("--nodes={}", spec.node_count),
        format!("--ntasks={}", spec.task_count),
    ];

    if spec.gpu_count > 0 {
        out.push(format!("--gres=gpu:{}", spec.gpu_count));
    }
    if let Some(cpus) = spec.cpus_per_task {
        out.push(format!("--cpus-per-task={}", cpus));
    }

    out.push(format!("--mem={}M", spec.memory_mb));
    out.push(format!("--time={}", spec.time_limit));

    if let Some(constraint) = &spec.constraint {
        out.push(format!("--constraint={}", constraint));
    }
    if let Some(account) = &spec.account {
        out.push(format!("--account={}", account));
    }
    if let Some(dir) = &spec.workdir {
        out.push(format!("--chdir={}", dir.display()));
    }
    if spec.notify.is_enabled() {
        out.push(format!("--mail-type={}", spec.notify.mail_type()));
        if let Some(address) = &spec.notify.address {
            out.push(format!("--mail-user={}", address));
        }
    }

    out.push(format!("--output={}", log_path.display()));
    out.push(format!("--error={}", log_path.display()));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use trainlet_core::{EntryPoint, MailEvent};

    fn train_spec() -> JobSpec {
        let mut spec = JobSpec::new("train", "gpu", EntryPoint::parse("python src/train.py"));
        spec.gpu_count = 4;
        spec.memory_mb = 32000;
        spec.time_limit = "1-00:00".parse().unwrap();
        spec.constraint = Some("cuda75".to_string());
        spec.notify.events.insert(MailEvent::End);
        spec.notify.events.insert(MailEvent::Fail);
        spec.notify.address = Some("someone@example.org".to_string());
        spec
    }

    #[test]
    fn test_render_batch_script() {
        let command = vec![
            "/usr/local/bin/trainlet".to_string(),
            "launch".to_string(),
            "--spec".to_string(),
            "/spool/train job.json".to_string(),
        ];
        let script = render_batch_script(
            &train_spec(),
            &command,
            &PathBuf::from("/spool/train-%j.log"),
        );

        let expected = "\
#!/bin/bash
#SBATCH --job-name=train
#SBATCH --partition=gpu
#SBATCH --nodes=1
#SBATCH --ntasks=1
#SBATCH --gres=gpu:4
#SBATCH --mem=32000M
#SBATCH --time=1-00:00
#SBATCH --constraint=cuda75
#SBATCH --mail-type=END,FAIL
#SBATCH --mail-user=someone@example.org
#SBATCH --output=/spool/train-%j.log
#SBATCH --error=/spool/train-%j.log

exec /usr/local/bin/trainlet launch --spec '/spool/train job.json'
";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_optional_directives_omitted() {
        let mut spec = JobSpec::new("cpu", "debug", EntryPoint::parse("true"));
        spec.gpu_count = 0;
        let dirs = directives(&spec, Path::new("log"));

        assert!(!dirs.iter().any(|d| d.starts_with("--gres")));
        assert!(!dirs.iter().any(|d| d.starts_with("--mail")));
        assert!(!dirs.iter().any(|d| d.starts_with("--constraint")));
    }

    #[test]
    fn test_optional_directives_present() {
        let mut spec = train_spec();
        spec.cpus_per_task = Some(8);
        spec.account = Some("proj".to_string());
        spec.workdir = Some(PathBuf::from("/work/run1"));
        let dirs = directives(&spec, Path::new("log"));

        assert!(dirs.contains(&"--cpus-per-task=8".to_string()));
        assert!(dirs.contains(&"--account=proj".to_string()));
        assert!(dirs.contains(&"--chdir=/work/run1".to_string()));
    }

    #[test]
    fn test_valid_spec_renders_one_line_per_directive() {
        let mut spec = train_spec();
        spec.account = Some("proj".to_string());
        spec.workdir = Some(PathBuf::from("/work/run 1"));
        assert!(spec.validate().is_ok());

        let command = vec!["trainlet".to_string(), "launch".to_string()];
        let script = render_batch_script(&spec, &command, Path::new("/spool/train-%j.log"));
        let header: Vec<&str> = script
            .lines()
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();

        assert_eq!(header.len(), directives(&spec, Path::new("/spool/train-%j.log")).len());
        assert!(header.iter().all(|line| line.starts_with("#SBATCH --")));
    }

    #[test]
    fn test_injected_newline_is_rejected_before_rendering() {
        let mut spec = train_spec();
        spec.constraint = Some("cuda75\ntouch /tmp/owned".to_string());

        assert_eq!(spec.validate().unwrap_err().field(), Some("constraint"));
    }
}
