//! Configuration loading and validation for forkwatch
//!
//! This module parses a TOML jobs file into [`JobSpec`] values plus the
//! [`SupervisorConfig`], applies defaults via serde, and performs strict
//! validation with field-path error messages.

use crate::{CoreError, Result};
use schema::{EnvPolicy, SpawnRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Tunables for a [`Supervisor`](crate::supervisor::Supervisor)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Upper bound on consecutive interrupted wait calls.
    ///
    /// `None` retries interrupted waits without limit, so interruption is
    /// never reported to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interrupted_waits: Option<u32>,
}

impl SupervisorConfig {
    /// Validate the supervisor section
    pub fn validate(&self) -> Result<()> {
        if self.max_interrupted_waits == Some(0) {
            return Err(CoreError::ValidationError(
                "supervisor.maxInterruptedWaits: must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named spawn request from a jobs file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Label used when reporting the job's outcome
    pub name: String,

    /// What to run
    #[serde(flatten)]
    pub request: SpawnRequest,
}

/// Top-level TOML structure for a jobs file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobsFile {
    /// Supervisor tunables
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Jobs to launch
    pub jobs: Vec<JobSpec>,
}

impl JobsFile {
    /// Validate the configuration and return `Result<()>` with field-path errors
    pub fn validate(&self) -> Result<()> {
        self.supervisor.validate()?;

        if self.jobs.is_empty() {
            return Err(CoreError::ValidationError(
                "jobs: must contain at least one job".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, job) in self.jobs.iter().enumerate() {
            if job.name.trim().is_empty() {
                return Err(CoreError::ValidationError(format!(
                    "jobs[{}].name: cannot be empty",
                    i
                )));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "jobs[{}].name: duplicate name '{}'",
                    i, job.name
                )));
            }
            validate_request(&job.request).map_err(|msg| {
                CoreError::ValidationError(format!("jobs[{}].{}", i, msg))
            })?;
        }
        Ok(())
    }
}

/// Check that a request can be converted into C strings for exec.
///
/// Returns a field-path message such as `args[2]: contains a NUL byte`.
pub fn validate_request(request: &SpawnRequest) -> std::result::Result<(), String> {
    if request.program.is_empty() {
        return Err("program: cannot be empty".to_string());
    }
    if request.program.contains('\0') {
        return Err("program: contains a NUL byte".to_string());
    }
    for (i, arg) in request.args.iter().enumerate() {
        if arg.contains('\0') {
            return Err(format!("args[{}]: contains a NUL byte", i));
        }
    }
    if let Some(vars) = request.env.vars() {
        let field = match request.env {
            EnvPolicy::Replace(_) => "env.replace",
            _ => "env.extend",
        };
        for (key, value) in vars {
            if key.is_empty() {
                return Err(format!("{}: keys cannot be empty", field));
            }
            if key.contains('=') || key.contains('\0') {
                return Err(format!("{}[{}]: key cannot contain '=' or NUL", field, key));
            }
            if value.contains('\0') {
                return Err(format!("{}[{}]: value contains a NUL byte", field, key));
            }
        }
    }
    Ok(())
}

/// Load jobs from a TOML file path
pub fn load_jobs_from_toml_path(path: impl AsRef<Path>) -> Result<JobsFile> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|e| {
        io::Error::new(e.kind(), format!("failed to read config {:?}: {}", path, e))
    })?;
    load_jobs_from_toml_str(&data)
}

/// Load jobs from a TOML string
pub fn load_jobs_from_toml_str(input: &str) -> Result<JobsFile> {
    let cfg: JobsFile = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    cfg.validate()?;
    Ok(cfg)
}
