//! # etosctl
//!
//! Command line interface for ETOS (Eiffel Test Orchestration System).
//!
//! ```bash
//! # Start a test run and follow it to a verdict
//! etosctl testrun v0 start -s https://suites/smoke.json -i pkg:docker/app@1.0
//! etosctl testrun v0 results --id <tercc-id> -r http://graphql.local/graphql --wait
//!
//! # Evaluate an exported run offline, checking signatures
//! etosctl testrun v0 results --id <tercc-id> --events-file run.jsonl --public-key signer.pub.pem
//! ```
//!
//! The server is configured in `etosctl.json` or with `ETOS_SERVER_URL` and
//! `ETOS_SERVER_TOKEN`.

pub mod commands;
pub mod error;
pub mod logging;
pub mod registry;

use clap::{Arg, ArgAction, Command};

pub use error::{CliError, CliResult};
pub use registry::{AppContext, CliCommand, CommandRegistry};

/// Root command carrying the global flags
pub fn root_command() -> Command {
    Command::new("etosctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ETOS CLI - A command line interface for ETOS")
        .long_about(
            "ETOS CLI is a command line interface for ETOS (Eiffel Test Orchestration System).\n\
             It provides commands for managing and interacting with ETOS services.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debug output"),
        )
}

/// Registry with all built-in commands
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    commands::register_builtin(&mut registry);
    registry
}
