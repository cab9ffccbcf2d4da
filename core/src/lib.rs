//! Core functionality for forkwatch
//!
//! This crate launches child processes, decodes their wait statuses and
//! reaps them, all without leaving zombies behind. The CLI is a thin shell
//! over [`Supervisor`].

pub mod config;
pub mod error;
#[cfg(unix)]
pub mod process;
pub mod status;
#[cfg(unix)]
pub mod supervisor;

#[cfg(test)]
mod error_tests;

// Re-export schema types for convenience
pub use schema::*;

pub use config::{JobSpec, JobsFile, SupervisorConfig};
pub use error::{CoreError, Result, SignalError, SpawnError, WaitError};
pub use status::decode;
#[cfg(unix)]
pub use supervisor::{Reaped, Supervisor};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    ///
    /// `RUST_LOG` takes precedence over `level` when set.
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
