//! Event Collector
//!
//! The collector assembles the [`Events`] aggregate for one test run by
//! querying an [`EventRepository`]. It is meant to be polled: each call
//! fetches only what is still missing and merges it into the aggregate it
//! owns, so a run can be followed from definition to the last finished
//! suite without refetching known events.
//!
//! Missing upstream events stop collection early without an error. Whether
//! the aggregate is complete enough to produce a verdict is decided by
//! [`crate::results::TestResults`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::error::{EtosError, Result};
use crate::events::{Event, EventKind, Events};
use crate::repository::{EventRepository, QueryContext};

/// Polling collector for one run's events
pub struct Collector {
    repository: Arc<dyn EventRepository>,
    events: Events,
    dispatch: Dispatch,
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("repository", &self.repository.name())
            .field("events", &self.events)
            .finish()
    }
}

impl Collector {
    /// Create a collector with an empty aggregate
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self::resume(repository, Events::new())
    }

    /// Continue collecting into a previously captured aggregate
    pub fn resume(repository: Arc<dyn EventRepository>, events: Events) -> Self {
        Self {
            repository,
            events,
            dispatch: Dispatch::default(),
        }
    }

    /// Route this collector's log output to the given subscriber
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn into_events(self) -> Events {
        self.events
    }

    /// Fetch the run definition and the activity lifecycle events
    ///
    /// Stops without error as soon as the run definition or the activity
    /// trigger is not yet published.
    pub async fn collect_activity(&mut self, ctx: &QueryContext, run_id: &str) -> Result<&Events> {
        let dispatch = self.dispatch.clone();
        self.fill_activity(ctx, run_id)
            .with_subscriber(dispatch)
            .await?;
        Ok(&self.events)
    }

    /// Fetch everything still missing for the run
    ///
    /// Always refreshes the activity first, so cancellation and completion
    /// published after the trigger are picked up on later polls.
    pub async fn collect(&mut self, ctx: &QueryContext, run_id: &str) -> Result<&Events> {
        let dispatch = self.dispatch.clone();
        self.fill_all(ctx, run_id).with_subscriber(dispatch).await?;
        Ok(&self.events)
    }

    async fn fill_activity(&mut self, ctx: &QueryContext, run_id: &str) -> Result<()> {
        if self.events.tercc.is_none() {
            let tercc = bounded(
                ctx,
                "TERCC event",
                self.repository.request_tercc(ctx, run_id),
            )
            .await?;
            self.events.tercc = accept(tercc, EventKind::Tercc)?;
        }
        if self.events.tercc.is_none() {
            tracing::debug!("Run definition {} not yet published", run_id);
            return Ok(());
        }

        if self.events.activity.triggered.is_none() {
            let triggered = bounded(
                ctx,
                "activity triggered event",
                self.repository.request_activity_triggered(ctx, run_id),
            )
            .await?;
            self.events.activity.triggered = accept(triggered, EventKind::ActivityTriggered)?;
        }
        let activity_id = match self.events.activity_id() {
            Some(id) => id.to_string(),
            None => {
                tracing::debug!("Activity for run {} not yet triggered", run_id);
                return Ok(());
            }
        };

        if self.events.activity.canceled.is_none() {
            let canceled = bounded(
                ctx,
                "activity canceled event",
                self.repository.request_activity_canceled(ctx, &activity_id),
            )
            .await?;
            self.events.activity.canceled = accept(canceled, EventKind::ActivityCanceled)?;
            if self.events.activity.canceled.is_some() {
                tracing::info!("Activity {} was canceled", activity_id);
            }
        }

        if self.events.activity.finished.is_none() {
            let finished = bounded(
                ctx,
                "activity finished event",
                self.repository.request_activity_finished(ctx, &activity_id),
            )
            .await?;
            self.events.activity.finished = accept(finished, EventKind::ActivityFinished)?;
        }

        Ok(())
    }

    async fn fill_all(&mut self, ctx: &QueryContext, run_id: &str) -> Result<()> {
        self.fill_activity(ctx, run_id).await?;

        let activity_id = match self.events.activity_id() {
            Some(id) => id.to_string(),
            None => return Ok(()),
        };

        let started = bounded(
            ctx,
            "main test suites",
            self.repository.request_main_suites_started(ctx, &activity_id),
        )
        .await?;
        check_kinds(&started, EventKind::TestSuiteStarted)?;
        let added = self.events.merge_main_suites(started);
        if added > 0 {
            tracing::debug!("Found {} new main test suites for {}", added, activity_id);
        }

        for suite in self.events.main_suites.iter_mut() {
            if suite.finished.is_none() {
                let finished = bounded(
                    ctx,
                    "test suite finished event",
                    self.repository.request_test_suite_finished(ctx, suite.id()),
                )
                .await?;
                suite.finished = accept(finished, EventKind::TestSuiteFinished)?;
            }

            let started = bounded(
                ctx,
                "sub suites",
                self.repository.request_sub_suites_started(ctx, suite.id()),
            )
            .await?;
            check_kinds(&started, EventKind::TestSuiteStarted)?;
            suite.merge_sub_suites(started);

            for sub in suite.sub_suites.iter_mut().filter(|s| s.finished.is_none()) {
                let finished = bounded(
                    ctx,
                    "sub suite finished event",
                    self.repository.request_test_suite_finished(ctx, sub.id()),
                )
                .await?;
                sub.finished = accept(finished, EventKind::TestSuiteFinished)?;
            }
        }

        tracing::debug!("Run {} is {}", run_id, self.events.state());
        Ok(())
    }
}

/// Run a repository query under the context deadline, naming it on failure
async fn bounded<T, F>(ctx: &QueryContext, query: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| EtosError::Timeout { query })?,
        None => fut.await,
    };
    outcome.map_err(|e| {
        tracing::warn!("Query for {} failed: {}", query, e);
        EtosError::query(query, e)
    })
}

fn accept(event: Option<Event>, expected: EventKind) -> Result<Option<Event>> {
    if let Some(event) = &event {
        event.expect_kind(expected)?;
        tracing::debug!("Collected {} {}", expected, event.id());
    }
    Ok(event)
}

fn check_kinds(events: &[Event], expected: EventKind) -> Result<()> {
    events.iter().try_for_each(|e| e.expect_kind(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TestSuiteOutcome;
    use crate::repository::InMemoryRepository;

    fn finished_ok(suite_id: &str) -> Event {
        Event::test_suite_finished(
            suite_id,
            TestSuiteOutcome {
                conclusion: Some("SUCCESSFUL".to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_repository_yields_empty_aggregate() {
        let mut collector = Collector::new(Arc::new(InMemoryRepository::new()));
        let events = collector
            .collect(&QueryContext::new(), "missing")
            .await
            .unwrap();
        assert_eq!(events, &Events::new());
    }

    #[tokio::test]
    async fn test_collect_is_incremental() {
        let repository = Arc::new(InMemoryRepository::new());
        let tercc = Event::tercc("strategy");
        let run_id = tercc.id().to_string();
        let triggered = Event::activity_triggered("run", &run_id);
        let suite = Event::test_suite_started("suite", triggered.id());
        repository.publish(tercc).unwrap();
        repository.publish(triggered).unwrap();
        repository.publish(suite.clone()).unwrap();

        let ctx = QueryContext::new();
        let mut collector = Collector::new(repository.clone());
        collector.collect(&ctx, &run_id).await.unwrap();
        assert_eq!(collector.events().main_suites.len(), 1);
        assert!(!collector.events().main_suites[0].is_finished());

        repository.publish(finished_ok(suite.id())).unwrap();
        let events = collector.collect(&ctx, &run_id).await.unwrap();
        assert_eq!(events.main_suites.len(), 1);
        assert!(events.main_suites[0].is_finished());
    }

    #[tokio::test]
    async fn test_collect_activity_stops_without_trigger() {
        let repository = Arc::new(InMemoryRepository::new());
        let tercc = Event::tercc("strategy");
        let run_id = tercc.id().to_string();
        repository.publish(tercc).unwrap();

        let mut collector = Collector::new(repository);
        let events = collector
            .collect_activity(&QueryContext::new(), &run_id)
            .await
            .unwrap();
        assert!(events.tercc.is_some());
        assert!(events.activity.triggered.is_none());
    }
}
