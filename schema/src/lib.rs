//! Schema definitions for forkwatch
//!
//! This crate contains the data structures shared by the supervisor core and
//! the command-line front end: child identities, lifecycle states and spawn
//! requests. All types implement JSON Schema generation for external
//! consumption.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod request;
pub mod state;

#[cfg(test)]
mod serde_tests;

pub use request::{EnvPolicy, SpawnRequest};
pub use state::ProcessState;

/// Exit code a child uses when replacing its program image failed.
///
/// Follows the shell convention for "command not found / not executable".
/// The supervisor never exits with this code for any other reason.
pub const EXEC_FAILURE_EXIT_CODE: i32 = 127;

/// OS-assigned identity of a supervised child process
///
/// Always positive. Unique among live processes; the numeric value may be
/// reused by the OS after the child has been reaped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "i32", into = "i32")]
pub struct ChildId(i32);

impl ChildId {
    /// Wrap a raw PID, rejecting zero and negative values
    pub fn new(raw: i32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// The raw PID value
    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a raw value is not a valid child identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidChildId(pub i32);

impl fmt::Display for InvalidChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid child id {}: must be positive", self.0)
    }
}

impl std::error::Error for InvalidChildId {}

impl TryFrom<i32> for ChildId {
    type Error = InvalidChildId;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(InvalidChildId(raw))
    }
}

impl From<ChildId> for i32 {
    fn from(id: ChildId) -> Self {
        id.0
    }
}

impl JsonSchema for ChildId {
    fn schema_name() -> String {
        "ChildId".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        <i32>::json_schema(gen)
    }
}
