//! Shared log of observed values for scenario checks.

use crate::harness::TestFailure;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

#[derive(Debug)]
struct LoggerState<T> {
    logged: Vec<T>,
    expected: Vec<T>,
}

/// Cloneable log of observed values, with an optional expected sequence.
///
/// Clones share the same log, so mocks can hold one while the test checks
/// the result through another.
#[derive(Debug)]
pub struct TestLogger<T> {
    state: Rc<RefCell<LoggerState<T>>>,
}

impl<T> Clone for TestLogger<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone + PartialEq + Debug> TestLogger<T> {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoggerState {
                logged: Vec::new(),
                expected: Vec::new(),
            })),
        }
    }

    /// Record a value.
    pub fn log(&self, value: T) {
        self.state.borrow_mut().logged.push(value);
    }

    /// Values logged so far.
    pub fn logged(&self) -> Vec<T> {
        self.state.borrow().logged.clone()
    }

    /// Number of values logged so far.
    pub fn len(&self) -> usize {
        self.state.borrow().logged.len()
    }

    /// Whether nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().logged.is_empty()
    }

    /// Replace the expected sequence.
    pub fn expect(&self, values: impl IntoIterator<Item = T>) {
        self.state.borrow_mut().expected = values.into_iter().collect();
    }

    /// Append one expected value.
    pub fn expect_next(&self, value: T) {
        self.state.borrow_mut().expected.push(value);
    }

    /// Expected sequence.
    pub fn expected(&self) -> Vec<T> {
        self.state.borrow().expected.clone()
    }

    /// Forget logged and expected values.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.logged.clear();
        state.expected.clear();
    }

    /// Compare the log with the expected sequence.
    pub fn verify(&self) -> Result<(), TestFailure> {
        let state = self.state.borrow();
        if state.logged == state.expected {
            return Ok(());
        }
        Err(TestFailure::LogMismatch {
            expected: format!("{:?}", state.expected),
            actual: format!("{:?}", state.logged),
        })
    }
}

impl<T: Clone + PartialEq + Debug> Default for TestLogger<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_log() {
        let logger = TestLogger::new();
        let other = logger.clone();
        other.log(1);
        other.log(2);
        assert_eq!(logger.logged(), vec![1, 2]);
    }

    #[test]
    fn test_verify() {
        let logger = TestLogger::new();
        logger.expect(["a", "b"]);
        logger.log("a");
        assert!(matches!(logger.verify(), Err(TestFailure::LogMismatch { .. })));

        logger.log("b");
        assert!(logger.verify().is_ok());

        logger.clear();
        assert!(logger.is_empty());
        assert!(logger.verify().is_ok());
    }
}
