//! Eiffel event model
//!
//! - [`event`]: typed events and their payloads
//! - [`raw`]: undecoded documents and the decoding boundary
//! - [`graph`]: the per-run aggregate the collector fills in

pub mod event;
pub mod graph;
pub mod raw;

pub use event::{
    link_type, major_version, ActivityCanceledData, ActivityFinishedData, ActivityOutcome,
    ActivityTriggeredData, Event, EventData, EventKind, IntegrityProtection, Link, Meta,
    Security, SelectionStrategy, Source, TerccData, TestSuiteFinishedData, TestSuiteOutcome,
    TestSuiteStartedData, SUCCESSFUL,
};
pub use graph::{Activity, EventLocation, Events, RunState, SubSuite, TestSuite};
pub use raw::{parse_jsonl, RawEvent};
