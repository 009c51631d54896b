//! Python virtualenv activation as explicit environment edits

use std::path::PathBuf;
use tracing::debug;
use trainlet_core::{TrainletError, TrainletResult};

use crate::delta::{EnvChange, EnvDelta};

/// A virtualenv directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Label used in environment errors
    pub fn label(&self) -> String {
        format!("virtualenv {}", self.root.display())
    }

    /// Edits `source bin/activate` would make
    ///
    /// Fails when the directory has no `bin/` or no `pyvenv.cfg`/`bin/activate`.
    pub async fn activate(&self) -> TrainletResult<EnvDelta> {
        let bin = self.root.join("bin");
        let bin_ok = tokio::fs::metadata(&bin)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !bin_ok {
            return Err(TrainletError::environment(
                self.label(),
                "no bin directory",
            ));
        }

        let marked = tokio::fs::try_exists(self.root.join("pyvenv.cfg"))
            .await
            .unwrap_or(false)
            || tokio::fs::try_exists(bin.join("activate"))
                .await
                .unwrap_or(false);
        if !marked {
            return Err(TrainletError::environment(
                self.label(),
                "not a virtualenv (missing pyvenv.cfg and bin/activate)",
            ));
        }

        let mut delta = EnvDelta::new();
        delta.push(EnvChange::Set(
            "VIRTUAL_ENV".to_string(),
            self.root.to_string_lossy().into_owned(),
        ));
        delta.push(EnvChange::PrependPath(
            "PATH".to_string(),
            bin.to_string_lossy().into_owned(),
        ));
        delta.push(EnvChange::Unset("PYTHONHOME".to_string()));

        debug!(root = %self.root.display(), "Resolved virtualenv");

        Ok(delta)
    }
}
