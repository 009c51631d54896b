//! Module system trait definitions

use async_trait::async_trait;
use trainlet_core::TrainletResult;

use crate::delta::{EnvDelta, EnvVars};

/// A module system that can activate named modules
///
/// Activation receives the environment built so far and returns the edits the
/// module makes to it. Implementations must not touch the invoking process's
/// own environment.
#[async_trait]
pub trait ModuleSystem: Send + Sync {
    /// Activate `module` on top of `current`
    async fn activate(&self, module: &str, current: &EnvVars) -> TrainletResult<EnvDelta>;

    /// Get the module system name
    fn name(&self) -> &'static str;
}
