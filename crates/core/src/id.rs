//! Identifiers for scheduler entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a task owner (or an action instigator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(Ulid);

impl OwnerId {
    /// Generate a new OwnerId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Handle of a task stored in a `GameplayTasksComponent`.
///
/// Handles are never reused by the component that issued them, so a stale
/// handle simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Handle of a pawn action stored in a `PawnActionsComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionHandle(u64);

impl ActionHandle {
    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Monotonic allocator for handles.
#[derive(Debug, Clone, Default)]
pub struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    /// Create a new allocator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next task handle.
    pub fn next_task(&mut self) -> TaskHandle {
        TaskHandle(self.bump())
    }

    /// Allocate the next action handle.
    pub fn next_action(&mut self) -> ActionHandle {
        ActionHandle(self.bump())
    }

    fn bump(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_roundtrip() {
        let id = OwnerId::new();
        let parsed: OwnerId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut alloc = HandleAllocator::new();
        let a = alloc.next_task();
        let b = alloc.next_task();
        let c = alloc.next_action();
        assert_ne!(a, b);
        assert_eq!(c.raw(), 2);
        assert_eq!(a.to_string(), "task#0");
    }
}
