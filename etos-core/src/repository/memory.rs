//! In-memory event repository
//!
//! Holds published events in a vector and answers queries by following
//! links, the same relations a protocol event store would index. Used by
//! tests, by offline evaluation of exported event logs, and by embedders
//! that receive events over their own transport.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{EventRepository, QueryContext};
use crate::error::{EtosError, Result};
use crate::events::{link_type, parse_jsonl, Event, EventKind};

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    events: RwLock<Vec<Event>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: RwLock::new(events.into_iter().collect()),
        }
    }

    /// Load newline-delimited JSON events from a string
    pub fn from_jsonl(content: &str) -> Result<Self> {
        Ok(Self::with_events(parse_jsonl(content)?))
    }

    /// Load newline-delimited JSON events from a file
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_jsonl(&content)
    }

    /// Make an event visible to subsequent queries
    pub fn publish(&self, event: Event) -> Result<()> {
        let mut events = self.events.write().map_err(|_| EtosError::RepositoryLocked)?;
        events.push(event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn find_all(&self, kind: EventKind, link: &str, target: &str) -> Result<Vec<Event>> {
        let events = self.events.read().map_err(|_| EtosError::RepositoryLocked)?;
        Ok(events
            .iter()
            .filter(|e| e.kind() == kind && e.links_to(link, target))
            .cloned()
            .collect())
    }

    fn find_first(&self, kind: EventKind, link: &str, target: &str) -> Result<Option<Event>> {
        Ok(self.find_all(kind, link, target)?.into_iter().next())
    }
}

#[async_trait]
impl EventRepository for InMemoryRepository {
    async fn request_tercc(&self, _ctx: &QueryContext, id: &str) -> Result<Option<Event>> {
        let events = self.events.read().map_err(|_| EtosError::RepositoryLocked)?;
        Ok(events
            .iter()
            .find(|e| e.kind() == EventKind::Tercc && e.id() == id)
            .cloned())
    }

    async fn request_activity_triggered(
        &self,
        _ctx: &QueryContext,
        tercc_id: &str,
    ) -> Result<Option<Event>> {
        self.find_first(EventKind::ActivityTriggered, link_type::CAUSE, tercc_id)
    }

    async fn request_activity_canceled(
        &self,
        _ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>> {
        self.find_first(
            EventKind::ActivityCanceled,
            link_type::ACTIVITY_EXECUTION,
            activity_id,
        )
    }

    async fn request_activity_finished(
        &self,
        _ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>> {
        self.find_first(
            EventKind::ActivityFinished,
            link_type::ACTIVITY_EXECUTION,
            activity_id,
        )
    }

    async fn request_main_suites_started(
        &self,
        _ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Vec<Event>> {
        self.find_all(EventKind::TestSuiteStarted, link_type::CONTEXT, activity_id)
    }

    async fn request_sub_suites_started(
        &self,
        _ctx: &QueryContext,
        main_suite_id: &str,
    ) -> Result<Vec<Event>> {
        self.find_all(EventKind::TestSuiteStarted, link_type::CONTEXT, main_suite_id)
    }

    async fn request_test_suite_finished(
        &self,
        _ctx: &QueryContext,
        suite_id: &str,
    ) -> Result<Option<Event>> {
        self.find_first(
            EventKind::TestSuiteFinished,
            link_type::TEST_SUITE_EXECUTION,
            suite_id,
        )
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
