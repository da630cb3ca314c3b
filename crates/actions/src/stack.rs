//! Per-priority action stack.

use gametask_core::ActionHandle;

/// Actions pushed at one priority level, bottom first.
///
/// Each action is the parent of the one right above it; only the top one
/// can run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionStack {
    actions: Vec<ActionHandle>,
}

impl ActionStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Top of the stack.
    pub fn top(&self) -> Option<ActionHandle> {
        self.actions.last().copied()
    }

    /// Put an action on top.
    pub fn push(&mut self, action: ActionHandle) {
        self.actions.push(action);
    }

    /// Remove `action` and everything above it.
    ///
    /// Returns the removed actions top first, or an empty list when the
    /// action is not on this stack.
    pub fn cut_at(&mut self, action: ActionHandle) -> Vec<ActionHandle> {
        match self.actions.iter().position(|a| *a == action) {
            Some(index) => {
                let mut removed = self.actions.split_off(index);
                removed.reverse();
                removed
            }
            None => Vec::new(),
        }
    }

    /// Whether `action` is on this stack.
    pub fn contains(&self, action: ActionHandle) -> bool {
        self.actions.contains(&action)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions bottom first.
    pub fn as_slice(&self) -> &[ActionHandle] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_returns_top_first() {
        let handles: Vec<ActionHandle> = (0..4).map(ActionHandle::from_raw).collect();
        let mut stack = ActionStack::new();
        for h in &handles {
            stack.push(*h);
        }
        assert_eq!(stack.top(), Some(handles[3]));

        let removed = stack.cut_at(handles[1]);
        assert_eq!(removed, vec![handles[3], handles[2], handles[1]]);
        assert_eq!(stack.as_slice(), &[handles[0]]);
    }

    #[test]
    fn test_cut_missing_action() {
        let mut stack = ActionStack::new();
        stack.push(ActionHandle::from_raw(1));
        assert!(stack.cut_at(ActionHandle::from_raw(7)).is_empty());
        assert_eq!(stack.len(), 1);
    }
}
