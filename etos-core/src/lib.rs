//! # ETOS Core - test run results from Eiffel events
//!
//! A test run in ETOS is observable only through the Eiffel events its
//! services publish. This crate turns those events into an answer to the
//! one question a client asks: did the run pass?
//!
//! - **Events**: typed Eiffel events, decoded once at the repository boundary
//! - **Repository**: where events come from (GraphQL API, in-memory)
//! - **Collector**: polls a repository and assembles one run's event graph
//! - **Results**: reduces the event graph to a verdict
//! - **Integrity**: schema validation and RS256 signatures for events
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use etos_core::{Collector, Event, InMemoryRepository, QueryContext, TestResults};
//! use etos_core::events::TestSuiteOutcome;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let repository = Arc::new(InMemoryRepository::new());
//!
//! let tercc = Event::tercc("selection-strategy");
//! let run_id = tercc.id().to_string();
//! let triggered = Event::activity_triggered("ETOS test run", &run_id);
//! let suite = Event::test_suite_started("smoke", triggered.id());
//! let finished = Event::test_suite_finished(
//!     suite.id(),
//!     TestSuiteOutcome {
//!         conclusion: Some("SUCCESSFUL".to_string()),
//!         ..Default::default()
//!     },
//! );
//! for event in [tercc, triggered, suite, finished] {
//!     repository.publish(event).unwrap();
//! }
//!
//! let mut collector = Collector::new(repository);
//! let events = collector.collect(&QueryContext::new(), &run_id).await.unwrap();
//! let verdict = TestResults::new(events).get_results().unwrap();
//! assert!(verdict.success);
//! # });
//! ```

pub mod collector;
pub mod error;
pub mod events;
pub mod integrity;
pub mod repository;
pub mod results;

pub use collector::Collector;
pub use error::{ErrorCategory, EtosError, Result};
pub use events::{Event, EventKind, Events, RunState};
#[cfg(feature = "graphql")]
pub use repository::GraphQlRepository;
pub use repository::{EventRepository, InMemoryRepository, QueryContext};
pub use results::{get_test_results, TestResults, Verdict};
