//! # ETOS Client
//!
//! Talks to the ETOS API to start, stop and inspect test runs, and loads the
//! client configuration shared by the `etosctl` command line.
//!
//! Evaluating a run's result is not an API call: it is done from the run's
//! Eiffel events with `etos-core`.

pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod response;

pub use client::{HttpClient, RunClient, V0Client, Version};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use params::{ProviderConfig, TestRunParams};
pub use response::TestRun;
