//! Test run verdicts
//!
//! [`TestResults`] reduces a collected [`Events`] aggregate to a pass/fail
//! [`Verdict`]. Incomplete aggregates are reported as errors rather than as
//! failures, so callers can tell "not finished yet" apart from "failed".

use serde::{Deserialize, Serialize};
use tracing::Dispatch;

use crate::collector::Collector;
use crate::error::{EtosError, Result};
use crate::events::{Events, TestSuite};
use crate::repository::QueryContext;

pub const SUCCESS_MESSAGE: &str = "Test suite finished successfully.";

/// Used when suites failed but none produced a message
pub const GENERIC_FAILURE_MESSAGE: &str = "Test case failures during test suite execution";

/// Final outcome of a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub message: String,
}

impl Verdict {
    pub fn passed() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Evaluates the verdict of a collected run
pub struct TestResults<'a> {
    events: &'a Events,
    dispatch: Dispatch,
}

impl<'a> TestResults<'a> {
    pub fn new(events: &'a Events) -> Self {
        Self {
            events,
            dispatch: Dispatch::default(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Compute the verdict, or report why the run is not ready for one
    pub fn get_results(&self) -> Result<Verdict> {
        tracing::dispatcher::with_default(&self.dispatch, || self.evaluate())
    }

    fn evaluate(&self) -> Result<Verdict> {
        if self.events.tercc.is_none() {
            return Err(EtosError::NoTercc);
        }
        if self.events.activity.triggered.is_none() {
            return Err(EtosError::NoActivityTriggered);
        }
        if self.events.activity.canceled.is_some() {
            return Err(EtosError::ActivityCanceled);
        }
        if self.events.main_suites.is_empty() {
            return Err(EtosError::NoMainSuites);
        }
        if let Some(suite) = self.events.main_suites.iter().find(|s| !s.is_finished()) {
            return Err(EtosError::SuiteNotFinished {
                suite_id: suite.id().to_string(),
            });
        }

        if !self.has_failed() {
            return Ok(Verdict::passed());
        }

        let mut messages = self.fail_messages();
        // The last failure is reported; earlier ones only reach the log.
        let last = messages.pop();
        for message in &messages {
            tracing::error!("{}", message);
        }
        Ok(Verdict::failed(
            last.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        ))
    }

    fn failed_suites(&self) -> Vec<&'a TestSuite> {
        self.events
            .main_suites
            .iter()
            .filter(|suite| !suite.outcome().map(|o| o.is_successful()).unwrap_or(false))
            .collect()
    }

    fn has_failed(&self) -> bool {
        !self.failed_suites().is_empty()
    }

    fn fail_messages(&self) -> Vec<String> {
        self.failed_suites()
            .into_iter()
            .map(|suite| {
                let description = suite
                    .outcome()
                    .and_then(|o| o.description.as_deref())
                    .unwrap_or_default();
                format!("{}: {}", suite.name(), description)
            })
            .collect()
    }
}

/// Collect the run once and evaluate it
pub async fn get_test_results(
    collector: &mut Collector,
    ctx: &QueryContext,
    run_id: &str,
) -> Result<Verdict> {
    let dispatch = collector.dispatch().clone();
    let events = collector.collect(ctx, run_id).await?;
    TestResults::new(events).with_dispatch(dispatch).get_results()
}
