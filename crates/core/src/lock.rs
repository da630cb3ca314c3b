//! AI request priorities and priority-keyed resource locks.

use serde::{Deserialize, Serialize};

/// Priority of an AI request. Higher variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AiRequestPriority {
    /// Scripted requests that may be overridden by anything
    SoftScript,
    /// Regular AI logic
    Logic,
    /// Scripted requests that override AI logic
    HardScript,
    /// Reactions (hit reactions, stuns)
    Reaction,
    /// Overrides everything else
    Ultimate,
}

impl AiRequestPriority {
    /// Number of priority levels.
    pub const COUNT: usize = 5;

    /// All levels, lowest first.
    pub const ALL: [AiRequestPriority; Self::COUNT] = [
        Self::SoftScript,
        Self::Logic,
        Self::HardScript,
        Self::Reaction,
        Self::Ultimate,
    ];

    /// Position of this level in [`Self::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level at `index`, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Get string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftScript => "SoftScript",
            Self::Logic => "Logic",
            Self::HardScript => "HardScript",
            Self::Reaction => "Reaction",
            Self::Ultimate => "Ultimate",
        }
    }
}

impl std::fmt::Display for AiRequestPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock state of a single resource, one bit per priority level.
///
/// A lock held at level `X` makes the resource unavailable to every request
/// at `X` or below. Only strictly higher priorities may use it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLock {
    locks: u8,
}

impl ResourceLock {
    /// Create an unlocked resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock at `priority`.
    pub fn set_lock(&mut self, priority: AiRequestPriority) {
        self.locks |= 1 << priority.index();
    }

    /// Release the lock held at `priority`. Other levels are untouched.
    pub fn clear_lock(&mut self, priority: AiRequestPriority) {
        self.locks &= !(1 << priority.index());
    }

    /// Drop all locks.
    pub fn force_clear_all_locks(&mut self) {
        self.locks = 0;
    }

    /// Whether any level holds a lock.
    pub fn is_locked(self) -> bool {
        self.locks != 0
    }

    /// Whether a lock is held at exactly `priority`.
    pub fn is_locked_by(self, priority: AiRequestPriority) -> bool {
        self.locks & (1 << priority.index()) != 0
    }

    /// Whether a request at `priority` may use the resource.
    pub fn is_available_for(self, priority: AiRequestPriority) -> bool {
        AiRequestPriority::ALL[priority.index()..]
            .iter()
            .all(|level| !self.is_locked_by(*level))
    }

    /// Highest level holding a lock.
    pub fn lock_priority(self) -> Option<AiRequestPriority> {
        AiRequestPriority::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| self.is_locked_by(*level))
    }

    /// Names of all locking levels, for debugging.
    pub fn lock_priority_names(self) -> String {
        let names: Vec<&str> = AiRequestPriority::ALL
            .iter()
            .filter(|level| self.is_locked_by(**level))
            .map(|level| level.as_str())
            .collect();
        if names.is_empty() {
            "Unlocked".to_string()
        } else {
            names.join(", ")
        }
    }
}

impl std::ops::AddAssign for ResourceLock {
    fn add_assign(&mut self, other: Self) {
        self.locks |= other.locks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_priorities() {
        let mut lock = ResourceLock::new();
        for (level_index, level) in AiRequestPriority::ALL.iter().enumerate() {
            lock.set_lock(*level);
            for (test_index, test) in AiRequestPriority::ALL.iter().enumerate() {
                assert_eq!(
                    lock.is_available_for(*test),
                    test_index > level_index,
                    "locked up to {} tested at {}",
                    level,
                    test
                );
            }
        }
    }

    #[test]
    fn test_clear_at_wrong_priority_is_noop() {
        let mut lock = ResourceLock::new();
        lock.set_lock(AiRequestPriority::HardScript);
        lock.clear_lock(AiRequestPriority::Logic);
        assert!(lock.is_locked_by(AiRequestPriority::HardScript));
        assert!(!lock.is_available_for(AiRequestPriority::Logic));
        assert!(lock.is_available_for(AiRequestPriority::Reaction));

        lock.clear_lock(AiRequestPriority::HardScript);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_merge_locks() {
        let mut a = ResourceLock::new();
        let mut b = ResourceLock::new();
        a.set_lock(AiRequestPriority::Logic);
        b.set_lock(AiRequestPriority::Reaction);
        a += b;
        assert!(a.is_locked_by(AiRequestPriority::Logic));
        assert!(a.is_locked_by(AiRequestPriority::Reaction));
        assert_eq!(a.lock_priority(), Some(AiRequestPriority::Reaction));
        assert_eq!(a.lock_priority_names(), "Logic, Reaction");
    }

    #[test]
    fn test_force_clear() {
        let mut lock = ResourceLock::new();
        lock.set_lock(AiRequestPriority::Ultimate);
        lock.force_clear_all_locks();
        assert!(lock.is_available_for(AiRequestPriority::SoftScript));
        assert_eq!(lock.lock_priority_names(), "Unlocked");
    }
}
