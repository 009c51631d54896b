//! Module system backed by inline module definitions

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use trainlet_core::{ModuleDefinition, TrainletError, TrainletResult};

use crate::delta::{EnvChange, EnvDelta, EnvVars};
use crate::traits::ModuleSystem;

/// Modules defined in the job file as environment edits
///
/// Useful on hosts without Lmod or Environment Modules, and for tests.
#[derive(Debug, Clone, Default)]
pub struct CatalogModuleSystem {
    modules: BTreeMap<String, ModuleDefinition>,
}

impl CatalogModuleSystem {
    pub fn new(modules: BTreeMap<String, ModuleDefinition>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl ModuleSystem for CatalogModuleSystem {
    async fn activate(&self, module: &str, _current: &EnvVars) -> TrainletResult<EnvDelta> {
        let definition = self
            .modules
            .get(module)
            .ok_or_else(|| TrainletError::environment(module, "unknown module"))?;

        // unset, set, then path edits so a module can reset and rebuild a path
        let mut delta = EnvDelta::new();
        for name in &definition.unset {
            delta.push(EnvChange::Unset(name.clone()));
        }
        for (name, value) in &definition.set {
            delta.push(EnvChange::Set(name.clone(), value.clone()));
        }
        for (name, entries) in &definition.prepend_path {
            // last listed ends up first
            for entry in entries.iter().rev() {
                delta.push(EnvChange::PrependPath(name.clone(), entry.clone()));
            }
        }
        for (name, entries) in &definition.append_path {
            for entry in entries {
                delta.push(EnvChange::AppendPath(name.clone(), entry.clone()));
            }
        }

        debug!(
            module = module,
            changes = delta.changes().len(),
            "Resolved catalog module"
        );

        Ok(delta)
    }

    fn name(&self) -> &'static str {
        "catalog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuda() -> ModuleDefinition {
        ModuleDefinition {
            set: [("CUDA_HOME".to_string(), "/opt/cuda".to_string())].into(),
            prepend_path: [(
                "PATH".to_string(),
                vec!["/opt/cuda/bin".to_string(), "/opt/cuda/nvvm/bin".to_string()],
            )]
            .into(),
            append_path: BTreeMap::new(),
            unset: vec!["CUDA_VISIBLE_DEVICES".to_string()],
        }
    }

    #[tokio::test]
    async fn test_activate_known_module() {
        let system = CatalogModuleSystem::new([("cuda/9.0".to_string(), cuda())].into());
        let mut env: EnvVars = [
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("CUDA_VISIBLE_DEVICES".to_string(), "0".to_string()),
        ]
        .into();

        let delta = system.activate("cuda/9.0", &env).await.unwrap();
        delta.apply(&mut env);

        assert_eq!(env["CUDA_HOME"], "/opt/cuda");
        assert_eq!(env["PATH"], "/opt/cuda/bin:/opt/cuda/nvvm/bin:/usr/bin");
        assert!(!env.contains_key("CUDA_VISIBLE_DEVICES"));
    }

    #[tokio::test]
    async fn test_activate_unknown_module() {
        let system = CatalogModuleSystem::default();
        let err = system.activate("cudaX", &EnvVars::new()).await.unwrap_err();
        assert_eq!(err.module(), Some("cudaX"));
    }
}
