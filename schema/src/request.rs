//! Spawn requests submitted to the supervisor

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment the child process starts with
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "policy", content = "vars", rename_all = "camelCase")]
pub enum EnvPolicy {
    /// Inherit the parent's environment unchanged
    #[default]
    Inherit,
    /// Inherit the parent's environment and override the given variables
    Extend(BTreeMap<String, String>),
    /// Use exactly the given variables; an empty map clears the environment
    Replace(BTreeMap<String, String>),
}

impl EnvPolicy {
    /// An empty environment
    pub fn clear() -> Self {
        EnvPolicy::Replace(BTreeMap::new())
    }

    /// Explicit variables carried by the policy, if any
    pub fn vars(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            EnvPolicy::Inherit => None,
            EnvPolicy::Extend(vars) | EnvPolicy::Replace(vars) => Some(vars),
        }
    }
}

/// A request to create one child process
///
/// `args` excludes argv\[0\]; the child receives `program` as argv\[0\].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    /// Path of the executable to run
    pub program: String,

    /// Arguments passed after argv\[0\]
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment policy for the child
    #[serde(default)]
    pub env: EnvPolicy,

    /// Resolve a bare program name against `PATH` before creating the child
    #[serde(default)]
    pub search_path: bool,
}

impl SpawnRequest {
    /// Request to run `program` with no arguments and the inherited environment
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: EnvPolicy::Inherit,
            search_path: false,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace the environment policy
    pub fn env_policy(mut self, env: EnvPolicy) -> Self {
        self.env = env;
        self
    }

    /// Set one variable, turning an inherited environment into an extended one
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        match &mut self.env {
            EnvPolicy::Inherit => {
                self.env = EnvPolicy::Extend(BTreeMap::from([(key, value)]));
            }
            EnvPolicy::Extend(vars) | EnvPolicy::Replace(vars) => {
                vars.insert(key, value);
            }
        }
        self
    }

    /// Enable or disable `PATH` lookup for bare program names
    pub fn search_path(mut self, search: bool) -> Self {
        self.search_path = search;
        self
    }
}
