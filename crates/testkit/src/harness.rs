//! Latent test harness.
//!
//! A test runs `set_up`, `instant_test`, then `update` once per simulated
//! tick until it reports completion, and finally `tear_down`:
//! ```text
//! set_up -> instant_test -> update* -> tear_down
//! ```
//! `tear_down` runs even when an earlier step failed.

use chrono::{DateTime, Utc};
use gametask_core::{ConfigError, ResourceId, ResourceRegistry, ResourceSet, RuntimeConfig};
use gametask_tasks::TaskError;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a test failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TestFailure {
    /// A checked condition did not hold
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Logged values differ from the expected ones
    #[error("log mismatch: expected {expected}, got {actual}")]
    LogMismatch {
        /// Expected sequence
        expected: String,
        /// Observed sequence
        actual: String,
    },

    /// Latent test kept running past the tick limit
    #[error("latent test did not finish within {0} ticks")]
    Timeout(u32),

    /// Task creation failed
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Test environment is missing something
    #[error("setup failed: {0}")]
    SetUp(String),
}

/// Fail the test unless `cond` holds.
#[macro_export]
macro_rules! ai_test_true {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::TestFailure::Assertion(format!($($msg)+)));
        }
    };
}

/// Fail the test if `cond` holds.
#[macro_export]
macro_rules! ai_test_false {
    ($cond:expr, $($msg:tt)+) => {
        $crate::ai_test_true!(!$cond, $($msg)+)
    };
}

/// Fail the test unless both values are equal.
#[macro_export]
macro_rules! ai_test_equal {
    ($left:expr, $right:expr, $what:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err($crate::TestFailure::Assertion(format!(
                        "{}: expected {:?}, got {:?}",
                        $what, right, left
                    )));
                }
            }
        }
    };
}

/// What a test gets to work with.
#[derive(Debug, Clone)]
pub struct TestEnv {
    /// Effective configuration
    pub config: RuntimeConfig,

    /// Resources declared in the configuration
    pub registry: ResourceRegistry,
}

impl TestEnv {
    /// Build an environment from a configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        let registry = config.build_registry()?;
        Ok(Self { config, registry })
    }

    /// Id of a declared resource.
    pub fn resource(&self, name: &str) -> Result<ResourceId, TestFailure> {
        self.registry
            .id(name)
            .ok_or_else(|| TestFailure::SetUp(format!("resource '{}' is not declared", name)))
    }

    /// Set of declared resources.
    pub fn resources(&self, names: &[&str]) -> Result<ResourceSet, TestFailure> {
        self.registry
            .set_of(names)
            .map_err(|e| TestFailure::SetUp(e.to_string()))
    }
}

/// A scenario driven by the [`TestRunner`].
pub trait AiTest {
    /// Prepare components and expectations.
    fn set_up(&mut self, _env: &TestEnv) -> Result<(), TestFailure> {
        Ok(())
    }

    /// Checks that need no ticking.
    fn instant_test(&mut self) -> Result<(), TestFailure> {
        Ok(())
    }

    /// One simulated tick. Return `true` when done.
    fn update(&mut self, _delta_time: f32) -> Result<bool, TestFailure> {
        Ok(true)
    }

    /// Final checks, usually verifying the logger.
    fn tear_down(&mut self) -> Result<(), TestFailure> {
        Ok(())
    }
}

/// Outcome of one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Scenario name
    pub name: String,

    /// Whether it passed
    pub passed: bool,

    /// Number of `update` calls
    pub ticks: u32,

    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the test started
    pub started_at: DateTime<Utc>,

    /// Wall clock duration in milliseconds
    pub duration_ms: u64,
}

/// Outcome of a set of tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Per-test results, in run order
    pub results: Vec<TestReport>,
}

impl SuiteReport {
    /// Number of passed tests.
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Number of failed tests.
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// Whether every test passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}

/// Drives [`AiTest`]s.
pub struct TestRunner {
    env: TestEnv,
}

impl TestRunner {
    /// Create a runner for the given environment.
    pub fn new(env: TestEnv) -> Self {
        Self { env }
    }

    /// Create a runner with the default configuration.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Ok(Self::new(TestEnv::new(RuntimeConfig::default())?))
    }

    /// Environment handed to tests.
    pub fn env(&self) -> &TestEnv {
        &self.env
    }

    /// Run one test.
    pub fn run(&self, name: &str, test: &mut dyn AiTest) -> TestReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        debug!("Running {}", name);

        let mut ticks = 0;
        let outcome = self.drive(test, &mut ticks);
        let teardown = test.tear_down();
        let outcome = outcome.and(teardown);

        let report = TestReport {
            name: name.to_string(),
            passed: outcome.is_ok(),
            ticks,
            error: outcome.err().map(|e| e.to_string()),
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        match &report.error {
            None => info!("{} passed ({} ticks)", name, ticks),
            Some(error) => warn!("{} failed: {}", name, error),
        }
        report
    }

    fn drive(&self, test: &mut dyn AiTest, ticks: &mut u32) -> Result<(), TestFailure> {
        test.set_up(&self.env)?;
        test.instant_test()?;

        let limit = self.env.config.harness.max_latent_ticks;
        let delta_time = self.env.config.harness.tick_interval;
        loop {
            if *ticks >= limit {
                return Err(TestFailure::Timeout(limit));
            }
            *ticks += 1;
            if test.update(delta_time)? {
                return Ok(());
            }
        }
    }

    /// Run every scenario whose name contains `filter`.
    pub fn run_all(&self, scenarios: &[crate::Scenario], filter: Option<&str>) -> SuiteReport {
        let started_at = Utc::now();
        let results = scenarios
            .iter()
            .filter(|s| filter.map_or(true, |f| s.name.contains(f)))
            .map(|s| {
                let mut test = (s.create)();
                self.run(s.name, test.as_mut())
            })
            .collect();
        SuiteReport { started_at, results }
    }
}
