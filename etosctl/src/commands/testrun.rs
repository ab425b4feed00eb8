//! `etosctl testrun`: manage ETOS test runs and read their results

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{ArgGroup, ArgMatches, Args, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use etos_client::{ProviderConfig, RunClient, TestRun, TestRunParams};
use etos_core::integrity::{read_public_key, validate_events, verify_events};
use etos_core::{
    get_test_results, Collector, ErrorCategory, EventRepository, Events, GraphQlRepository,
    InMemoryRepository, QueryContext, Verdict,
};
use serde_json::{Map, Value};

use crate::error::{CliError, CliResult};
use crate::registry::{AppContext, CliCommand};

/// Exit status when a run finished with failed test suites
pub const EXIT_TESTS_FAILED: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "testrun",
    about = "Operate on ETOS testruns",
    long_about = "Operate on ETOS testruns.\n\n\
        Start new testruns, check their status and retrieve their results."
)]
pub struct TestrunArgs {
    #[command(subcommand)]
    pub version: TestrunVersion,
}

#[derive(Debug, Subcommand)]
pub enum TestrunVersion {
    /// Manage ETOSv0 testruns
    #[command(name = "v0")]
    V0 {
        #[command(subcommand)]
        action: V0Action,
    },
}

#[derive(Debug, Subcommand)]
pub enum V0Action {
    /// List testruns
    List,
    /// Get testrun details
    Get(IdArgs),
    /// Start a new testrun
    Start(StartArgs),
    /// Stop a running testrun
    Stop(IdArgs),
    /// Get the verdict of a testrun from its events
    Results(ResultsArgs),
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Testrun ID
    #[arg(short, long)]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Test suite ID (falls back to TEST_SUITE)
    #[arg(short = 's', long)]
    pub test_suite: Option<String>,

    /// Artifact created identity purl or ID (falls back to IDENTITY)
    #[arg(short, long)]
    pub identity: Option<String>,

    /// Activity for the TERCC to link to
    #[arg(short, long)]
    pub parent_activity: Option<String>,

    /// Workspace to do all the work in
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Where test artifacts should be stored
    #[arg(short, long)]
    pub artifact_dir: Option<String>,

    /// Where test reports should be stored
    #[arg(short, long)]
    pub report_dir: Option<String>,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 3600)]
    pub timeout: u64,

    /// Which IUT provider to use
    #[arg(long)]
    pub iut_provider: Option<String>,

    /// Which execution space provider to use
    #[arg(long)]
    pub execution_space_provider: Option<String>,

    /// Which log area provider to use
    #[arg(long)]
    pub log_area_provider: Option<String>,

    /// Additional dataset for the environment provider, one JSON object per flag
    #[arg(long, value_name = "JSON")]
    pub dataset: Vec<String>,
}

impl StartArgs {
    pub fn into_params(self) -> CliResult<TestRunParams> {
        let dataset = self
            .dataset
            .iter()
            .map(|entry| serde_json::from_str::<Map<String, Value>>(entry).map_err(CliError::Dataset))
            .collect::<CliResult<Vec<_>>>()?;

        let mut params = TestRunParams::new(
            self.test_suite.unwrap_or_default(),
            self.identity.unwrap_or_default(),
        );
        params.parent_activity_id = self.parent_activity;
        params.workspace = self.workspace;
        params.artifact_dir = self.artifact_dir;
        params.report_dir = self.report_dir;
        params.timeout = Duration::from_secs(self.timeout);
        params.provider_config = ProviderConfig {
            iut_provider: self.iut_provider,
            execution_space_provider: self.execution_space_provider,
            log_area_provider: self.log_area_provider,
        };
        params.dataset = dataset;
        Ok(params)
    }
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["repository", "events_file"])
))]
pub struct ResultsArgs {
    /// Testrun ID
    #[arg(short, long)]
    pub id: String,

    /// Event repository (GraphQL) URL
    #[arg(short, long)]
    pub repository: Option<String>,

    /// Read the run's events from a JSON lines file instead
    #[arg(long, value_name = "PATH")]
    pub events_file: Option<PathBuf>,

    /// Deadline for all repository queries, in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Poll until the results are ready or the deadline passes
    #[arg(long)]
    pub wait: bool,

    /// Seconds between polls with --wait
    #[arg(long, default_value_t = 10)]
    pub poll_interval: u64,

    /// Validate every collected event against its schema
    #[arg(long)]
    pub validate: bool,

    /// Verify event signatures with the RSA public key in this PEM file
    #[arg(long, value_name = "PATH")]
    pub public_key: Option<PathBuf>,
}

pub struct TestrunCommand;

#[async_trait]
impl CliCommand for TestrunCommand {
    fn name(&self) -> &'static str {
        "testrun"
    }

    fn command(&self) -> Command {
        TestrunArgs::command()
    }

    async fn run(&self, matches: &ArgMatches, ctx: &AppContext) -> CliResult<u8> {
        let args = TestrunArgs::from_arg_matches(matches)?;
        match args.version {
            TestrunVersion::V0 { action } => run_v0(action, ctx).await,
        }
    }
}

async fn run_v0(action: V0Action, ctx: &AppContext) -> CliResult<u8> {
    match action {
        V0Action::List => {
            let runs = ctx.v0_client()?.list_test_runs().await?;
            print!("{}", format_run_list(&runs));
        }
        V0Action::Get(args) => {
            let run = ctx.v0_client()?.get_test_run(&args.id).await?;
            print!("{}", format_run_details(&run));
        }
        V0Action::Start(args) => {
            let params = args.into_params()?;
            let run = ctx.v0_client()?.start_test_run(params).await?;
            print!("{}", format_run_started(&run));
        }
        V0Action::Stop(args) => {
            ctx.v0_client()?.stop_test_run(&args.id).await?;
            println!("Testrun {} stopped successfully", args.id);
        }
        V0Action::Results(args) => return run_results(args, ctx).await,
    }
    Ok(0)
}

async fn run_results(args: ResultsArgs, ctx: &AppContext) -> CliResult<u8> {
    let repository: Arc<dyn EventRepository> = if let Some(path) = &args.events_file {
        Arc::new(InMemoryRepository::from_jsonl_file(path)?)
    } else if let Some(url) = &args.repository {
        Arc::new(GraphQlRepository::new(url.as_str())?)
    } else {
        return Err(CliError::NoEventSource);
    };
    tracing::info!("Collecting events for {} from {}", args.id, repository.name());

    let query = QueryContext::with_timeout(Duration::from_secs(args.timeout));
    let poll = args.wait.then(|| Duration::from_secs(args.poll_interval));
    let mut collector = Collector::new(repository).with_dispatch(ctx.dispatch.clone());

    let verdict = await_verdict(&mut collector, &query, &args.id, poll).await?;
    check_events(collector.events(), args.validate, args.public_key.as_deref())?;

    print!("{}", format_verdict(&verdict));
    Ok(if verdict.success { 0 } else { EXIT_TESTS_FAILED })
}

/// Evaluate the run, polling while it is not ready when `poll` is set
///
/// Only not-ready conditions are polled; transport failures and a canceled
/// activity end the wait immediately. The deadline in `query` bounds the
/// whole wait.
pub async fn await_verdict(
    collector: &mut Collector,
    query: &QueryContext,
    run_id: &str,
    poll: Option<Duration>,
) -> CliResult<Verdict> {
    loop {
        let err = match get_test_results(collector, query, run_id).await {
            Ok(verdict) => return Ok(verdict),
            Err(err) if err.category() == ErrorCategory::NotReady => err,
            Err(err) => return Err(err.into()),
        };
        let Some(interval) = poll else {
            return Err(err.into());
        };

        let pause = query
            .remaining()
            .map_or(interval, |remaining| remaining.min(interval));
        if pause.is_zero() {
            return Err(err.into());
        }
        tracing::info!("Results not ready ({}), checking again in {:?}", err, pause);
        tokio::time::sleep(pause).await;
        if query.is_expired() {
            return Err(err.into());
        }
    }
}

/// Schema validation and signature verification of a collected run
pub fn check_events(events: &Events, validate: bool, public_key: Option<&Path>) -> CliResult<()> {
    if validate {
        validate_events(events)?;
        tracing::debug!("All collected events passed schema validation");
    }
    if let Some(path) = public_key {
        let key = read_public_key(path)?;
        verify_events(events, &key)?;
        tracing::debug!("All collected events carry valid signatures");
    }
    Ok(())
}

pub fn format_run_list(runs: &[TestRun]) -> String {
    let mut out = String::from("Testruns:\n");
    for run in runs {
        out.push_str(&format!("- {} (Status: {})\n", run.id, run.status));
    }
    out
}

pub fn format_run_details(run: &TestRun) -> String {
    format!(
        "Testrun Details:\nID: {}\nStatus: {}\nCreated: {}\nUpdated: {}\n",
        run.id,
        run.status,
        run.created_at.to_rfc3339(),
        run.updated_at.to_rfc3339()
    )
}

pub fn format_run_started(run: &TestRun) -> String {
    format!(
        "Testrun started successfully:\nID: {}\nStatus: {}\n",
        run.id, run.status
    )
}

pub fn format_verdict(verdict: &Verdict) -> String {
    format!(
        "Test Results:\nSuccess: {}\nMessage: {}\n",
        verdict.success, verdict.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(args: &[&str]) -> TestrunArgs {
        let mut argv = vec!["testrun"];
        argv.extend_from_slice(args);
        TestrunArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_start_flags_become_params() {
        let args = parse(&[
            "v0", "start", "-s", "suite-url", "-i", "pkg:docker/app@1.0", "-t", "120",
            "--iut-provider", "default", "--dataset", r#"{"a": 1}"#, "--dataset", r#"{"b": 2}"#,
        ]);
        let TestrunVersion::V0 { action: V0Action::Start(start) } = args.version else {
            panic!("expected start");
        };
        let params = start.into_params().unwrap();
        assert_eq!(params.test_suite_id, "suite-url");
        assert_eq!(params.identity, "pkg:docker/app@1.0");
        assert_eq!(params.timeout, Duration::from_secs(120));
        assert_eq!(params.provider_config.iut_provider.as_deref(), Some("default"));
        assert_eq!(params.dataset.len(), 2);
        assert_eq!(params.parent_activity_id, None);
    }

    #[test]
    fn test_start_defaults_timeout() {
        let args = parse(&["v0", "start", "-s", "suite", "-i", "id"]);
        let TestrunVersion::V0 { action: V0Action::Start(start) } = args.version else {
            panic!("expected start");
        };
        assert_eq!(start.timeout, 3600);
    }

    #[test]
    fn test_dataset_must_be_json_object() {
        let args = parse(&["v0", "start", "-s", "suite", "-i", "id", "--dataset", "[1, 2]"]);
        let TestrunVersion::V0 { action: V0Action::Start(start) } = args.version else {
            panic!("expected start");
        };
        assert!(matches!(start.into_params(), Err(CliError::Dataset(_))));
    }

    #[test]
    fn test_results_requires_an_event_source() {
        let err = TestrunArgs::try_parse_from(["testrun", "v0", "results", "--id", "run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_get_requires_id() {
        assert!(TestrunArgs::try_parse_from(["testrun", "v0", "get"]).is_err());
    }

    #[test]
    fn test_reports() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let run = TestRun {
            id: "run-1".to_string(),
            status: "running".to_string(),
            created_at: at,
            updated_at: at,
        };
        assert_eq!(
            format_run_list(&[run.clone()]),
            "Testruns:\n- run-1 (Status: running)\n"
        );
        assert!(format_run_details(&run).contains("Created: 2024-05-01T10:00:00+00:00\n"));
        assert_eq!(
            format_verdict(&Verdict::failed("smoke: broke")),
            "Test Results:\nSuccess: false\nMessage: smoke: broke\n"
        );
    }
}
