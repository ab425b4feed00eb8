//! Event repository abstraction
//!
//! The collector never talks to a concrete event store. It asks an
//! [`EventRepository`] for the handful of relations it needs to assemble a
//! run, and each adapter decides how to answer them.
//!
//! Absence of an event is never an error: single-event queries answer
//! `Ok(None)` and list queries answer an empty vector. `Err` is reserved for
//! transport failures and for documents that cannot be decoded.
//!
//! # Example
//!
//! ```rust
//! use etos_core::events::Event;
//! use etos_core::repository::{EventRepository, InMemoryRepository, QueryContext};
//!
//! # tokio_test_block(async {
//! let repository = InMemoryRepository::new();
//! let tercc = Event::tercc("strategy");
//! let id = tercc.id().to_string();
//! repository.publish(tercc).unwrap();
//!
//! let found = repository.request_tercc(&QueryContext::default(), &id).await.unwrap();
//! assert!(found.is_some());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;
use crate::events::Event;

#[cfg(feature = "graphql")]
pub mod graphql;
pub mod memory;

#[cfg(feature = "graphql")]
pub use graphql::GraphQlRepository;
pub use memory::InMemoryRepository;

/// Cancellation and deadline carrier passed to every repository query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryContext {
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context without a deadline
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().map(|r| r.is_zero()).unwrap_or(false)
    }
}

/// Read-only access to the events of test runs
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// The run-definition event with the given identifier
    async fn request_tercc(&self, ctx: &QueryContext, id: &str) -> Result<Option<Event>>;

    /// The activity triggered by the given run definition
    async fn request_activity_triggered(
        &self,
        ctx: &QueryContext,
        tercc_id: &str,
    ) -> Result<Option<Event>>;

    async fn request_activity_canceled(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>>;

    async fn request_activity_finished(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>>;

    /// Test suites started in the context of the activity
    async fn request_main_suites_started(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Vec<Event>>;

    /// Test suites started in the context of a main suite
    async fn request_sub_suites_started(
        &self,
        ctx: &QueryContext,
        main_suite_id: &str,
    ) -> Result<Vec<Event>>;

    /// The finished event for a started test suite
    async fn request_test_suite_finished(
        &self,
        ctx: &QueryContext,
        suite_id: &str,
    ) -> Result<Option<Event>>;

    /// Get repository name (for logging/debugging)
    fn name(&self) -> &'static str;
}
