//! Latent test harness and scenario suite for the schedulers.
//!
//! Scenarios drive a [`gametask_tasks::GameplayTasksComponent`] or a
//! [`gametask_actions::PawnActionsComponent`] with logging mocks and compare
//! the recorded callbacks against an expected sequence.

#![warn(missing_docs)]

mod logger;
mod harness;
mod mocks;
pub mod scenarios;

pub use logger::TestLogger;
pub use harness::{AiTest, SuiteReport, TestEnv, TestFailure, TestReport, TestRunner};
pub use mocks::{
    ActionLog, ActionMessage, MockOwner, MockTask, OwnerLog, OwnerMessage, TaskLog, TaskMessage,
    TestPawnAction,
};
pub use scenarios::Scenario;
