//! Bookkeeping of live children
//!
//! An identity is present exactly while its process has been created and
//! not yet reaped. An unreaped child keeps its pid reserved, so a present
//! identity can never name a different process.

use crate::process::unix::ExecReport;
use schema::{ChildId, ProcessState};
use std::collections::HashMap;

/// One tracked child
#[derive(Debug)]
pub struct TrackedChild {
    /// Last observed state
    pub state: ProcessState,
    /// Program the child was launched with
    pub program: String,
    /// Exec-report channel, read once the child terminates
    pub report: Option<ExecReport>,
}

/// Mapping from child identity to its tracked entry
#[derive(Debug, Default)]
pub struct SupervisorTable {
    entries: HashMap<ChildId, TrackedChild>,
}

impl SupervisorTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly created child as `Running`.
    ///
    /// Returns the previous entry if the identity was already present, which
    /// means a child was never reaped.
    pub fn insert(
        &mut self,
        id: ChildId,
        program: String,
        report: Option<ExecReport>,
    ) -> Option<TrackedChild> {
        self.entries.insert(
            id,
            TrackedChild {
                state: ProcessState::Running,
                program,
                report,
            },
        )
    }

    /// Last observed state of a tracked child
    pub fn state(&self, id: ChildId) -> Option<ProcessState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Program of a tracked child
    pub fn program(&self, id: ChildId) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.program.as_str())
    }

    /// Record a non-terminal state; returns false if `id` is not tracked
    pub fn set_state(&mut self, id: ChildId, state: ProcessState) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    /// Stop tracking a child
    pub fn remove(&mut self, id: ChildId) -> Option<TrackedChild> {
        self.entries.remove(&id)
    }

    /// Whether `id` is tracked
    pub fn contains(&self, id: ChildId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of tracked children
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no child is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked identities with their states, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (ChildId, ProcessState)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i32) -> ChildId {
        ChildId::new(raw).expect("positive pid")
    }

    #[test]
    fn test_insert_tracks_running() {
        let mut table = SupervisorTable::new();
        assert!(table.insert(id(10), "/bin/true".into(), None).is_none());
        assert_eq!(table.state(id(10)), Some(ProcessState::Running));
        assert_eq!(table.program(id(10)), Some("/bin/true"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_set_state_and_remove() {
        let mut table = SupervisorTable::new();
        table.insert(id(10), "sleep".into(), None);
        assert!(table.set_state(id(10), ProcessState::Stopped { signal: 19 }));
        assert!(!table.set_state(id(11), ProcessState::Running));
        assert_eq!(table.state(id(10)), Some(ProcessState::Stopped { signal: 19 }));

        let entry = table.remove(id(10)).expect("tracked");
        assert_eq!(entry.program, "sleep");
        assert!(table.is_empty());
        assert!(!table.contains(id(10)));
    }
}
