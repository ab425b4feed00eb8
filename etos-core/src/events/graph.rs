//! The per-run event aggregate
//!
//! [`Events`] is the partial view of one test run that the collector fills
//! in over repeated polls. Suites are kept in discovery order and
//! deduplicated by the identifier of their started event, so merging the
//! same repository answer twice leaves the aggregate unchanged.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::{Event, TestSuiteOutcome};

/// Everything known about one test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Events {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tercc: Option<Event>,
    #[serde(default)]
    pub activity: Activity,
    #[serde(default)]
    pub main_suites: Vec<TestSuite>,
}

/// Lifecycle events of the run's activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Event>,
}

/// A main test suite and the sub-suites started inside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub started: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Event>,
    #[serde(default)]
    pub sub_suites: Vec<SubSuite>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSuite {
    pub started: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Event>,
}

/// Coarse progress of a run, derived from which events are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run definition yet
    Unknown,
    /// Run defined, activity not triggered
    PartiallyTriggered,
    /// Activity triggered, suites still running or not yet started
    Triggered,
    Canceled,
    AllSuitesFinished,
}

impl RunState {
    /// No further polling can change the verdict
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Canceled | RunState::AllSuitesFinished)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Unknown => "unknown",
            RunState::PartiallyTriggered => "partially triggered",
            RunState::Triggered => "triggered",
            RunState::Canceled => "canceled",
            RunState::AllSuitesFinished => "all suites finished",
        };
        f.write_str(s)
    }
}

/// Where in the aggregate an event sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLocation {
    Tercc,
    ActivityTriggered,
    ActivityCanceled,
    ActivityFinished,
    SuiteStarted(usize),
    SuiteFinished(usize),
    SubSuiteStarted(usize, usize),
    SubSuiteFinished(usize, usize),
}

impl fmt::Display for EventLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLocation::Tercc => write!(f, "TERCC event"),
            EventLocation::ActivityTriggered => write!(f, "activity triggered event"),
            EventLocation::ActivityCanceled => write!(f, "activity canceled event"),
            EventLocation::ActivityFinished => write!(f, "activity finished event"),
            EventLocation::SuiteStarted(i) => write!(f, "test suite {} started event", i),
            EventLocation::SuiteFinished(i) => write!(f, "test suite {} finished event", i),
            EventLocation::SubSuiteStarted(i, j) => {
                write!(f, "test suite {} sub suite {} started event", i, j)
            }
            EventLocation::SubSuiteFinished(i, j) => {
                write!(f, "test suite {} sub suite {} finished event", i, j)
            }
        }
    }
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the activity-triggered event, once known
    pub fn activity_id(&self) -> Option<&str> {
        self.activity.triggered.as_ref().map(Event::id)
    }

    pub fn suite(&self, started_id: &str) -> Option<&TestSuite> {
        self.main_suites.iter().find(|s| s.id() == started_id)
    }

    /// Append main suites not already known, returning how many were added
    pub fn merge_main_suites(&mut self, started: Vec<Event>) -> usize {
        merge_by_id(&mut self.main_suites, started, TestSuite::id, TestSuite::new)
    }

    pub fn state(&self) -> RunState {
        if self.tercc.is_none() {
            return RunState::Unknown;
        }
        if self.activity.triggered.is_none() {
            return RunState::PartiallyTriggered;
        }
        if self.activity.canceled.is_some() {
            return RunState::Canceled;
        }
        if !self.main_suites.is_empty() && self.main_suites.iter().all(TestSuite::is_finished) {
            return RunState::AllSuitesFinished;
        }
        RunState::Triggered
    }

    /// Every present event with its position, in aggregate order
    pub fn located(&self) -> Vec<(EventLocation, &Event)> {
        let mut located = Vec::new();
        if let Some(e) = &self.tercc {
            located.push((EventLocation::Tercc, e));
        }
        if let Some(e) = &self.activity.triggered {
            located.push((EventLocation::ActivityTriggered, e));
        }
        if let Some(e) = &self.activity.canceled {
            located.push((EventLocation::ActivityCanceled, e));
        }
        if let Some(e) = &self.activity.finished {
            located.push((EventLocation::ActivityFinished, e));
        }
        for (i, suite) in self.main_suites.iter().enumerate() {
            located.push((EventLocation::SuiteStarted(i), &suite.started));
            if let Some(e) = &suite.finished {
                located.push((EventLocation::SuiteFinished(i), e));
            }
            for (j, sub) in suite.sub_suites.iter().enumerate() {
                located.push((EventLocation::SubSuiteStarted(i, j), &sub.started));
                if let Some(e) = &sub.finished {
                    located.push((EventLocation::SubSuiteFinished(i, j), e));
                }
            }
        }
        located
    }
}

impl TestSuite {
    pub fn new(started: Event) -> Self {
        Self {
            started,
            finished: None,
            sub_suites: Vec::new(),
        }
    }

    /// Identifier of the started event
    pub fn id(&self) -> &str {
        self.started.id()
    }

    pub fn name(&self) -> &str {
        self.started.name().unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn outcome(&self) -> Option<&TestSuiteOutcome> {
        self.finished.as_ref().and_then(Event::suite_outcome)
    }

    pub fn merge_sub_suites(&mut self, started: Vec<Event>) -> usize {
        merge_by_id(&mut self.sub_suites, started, SubSuite::id, SubSuite::new)
    }
}

impl SubSuite {
    pub fn new(started: Event) -> Self {
        Self {
            started,
            finished: None,
        }
    }

    pub fn id(&self) -> &str {
        self.started.id()
    }

    pub fn name(&self) -> &str {
        self.started.name().unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

fn merge_by_id<T>(
    known: &mut Vec<T>,
    incoming: Vec<Event>,
    id_of: fn(&T) -> &str,
    make: fn(Event) -> T,
) -> usize {
    let mut seen: HashSet<String> = known.iter().map(|t| id_of(t).to_string()).collect();
    let before = known.len();
    for event in incoming {
        if seen.insert(event.id().to_string()) {
            known.push(make(event));
        }
    }
    known.len() - before
}
