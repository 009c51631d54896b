//! Environment edits produced by module activation

use std::collections::BTreeMap;

/// Variable name to value
pub type EnvVars = BTreeMap<String, String>;

/// Separator for path-like variables
pub const PATH_SEPARATOR: char = ':';

/// Variables a shell rewrites on its own; never part of a module's edits
const SHELL_MANAGED: &[&str] = &["_", "SHLVL", "PWD", "OLDPWD"];

/// A single edit to an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Set(String, String),
    Unset(String),
    /// Put an entry at the front of a path list, dropping any earlier copy
    PrependPath(String, String),
    /// Put an entry at the back of a path list, dropping any earlier copy
    AppendPath(String, String),
}

/// Ordered edits returned by one activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDelta {
    changes: Vec<EnvChange>,
}

impl EnvDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: EnvChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[EnvChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Edits turning `before` into `after`
    pub fn diff(before: &EnvVars, after: &EnvVars) -> Self {
        let mut delta = Self::new();
        for (name, value) in after {
            if SHELL_MANAGED.contains(&name.as_str()) {
                continue;
            }
            if before.get(name) != Some(value) {
                delta.push(EnvChange::Set(name.clone(), value.clone()));
            }
        }
        for name in before.keys() {
            if SHELL_MANAGED.contains(&name.as_str()) {
                continue;
            }
            if !after.contains_key(name) {
                delta.push(EnvChange::Unset(name.clone()));
            }
        }
        delta
    }

    /// Apply every edit to `vars`, in order
    pub fn apply(&self, vars: &mut EnvVars) {
        for change in &self.changes {
            match change {
                EnvChange::Set(name, value) => {
                    vars.insert(name.clone(), value.clone());
                }
                EnvChange::Unset(name) => {
                    vars.remove(name);
                }
                EnvChange::PrependPath(name, entry) => {
                    let mut entries = path_entries(vars.get(name), entry);
                    entries.insert(0, entry.as_str());
                    let joined = join_path(&entries);
                    vars.insert(name.clone(), joined);
                }
                EnvChange::AppendPath(name, entry) => {
                    let mut entries = path_entries(vars.get(name), entry);
                    entries.push(entry.as_str());
                    let joined = join_path(&entries);
                    vars.insert(name.clone(), joined);
                }
            }
        }
    }
}

/// Existing entries of a path list, without `skip` and without empty entries
fn path_entries<'a>(value: Option<&'a String>, skip: &str) -> Vec<&'a str> {
    value
        .map(|v| {
            v.split(PATH_SEPARATOR)
                .filter(|e| !e.is_empty() && *e != skip)
                .collect()
        })
        .unwrap_or_default()
}

fn join_path(entries: &[&str]) -> String {
    entries.join(&PATH_SEPARATOR.to_string())
}

/// Parse the NUL-separated output of `env -0`
pub fn parse_env_nul(output: &[u8]) -> EnvVars {
    output
        .split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}
