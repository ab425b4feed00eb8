//! Command registration
//!
//! Top-level commands are registered explicitly when the process starts.
//! The registry builds the clap command tree from them and routes parsed
//! arguments to the matching handler.

use async_trait::async_trait;
use clap::{ArgMatches, Command};
use etos_client::{ClientConfig, HttpClient, V0Client};
use tracing::Dispatch;

use crate::error::{CliError, CliResult};

/// Shared state handed to every command
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: ClientConfig,
    pub dispatch: Dispatch,
}

impl AppContext {
    pub fn new(config: ClientConfig, dispatch: Dispatch) -> Self {
        Self { config, dispatch }
    }

    /// Client for the v0 test run API
    pub fn v0_client(&self) -> CliResult<V0Client> {
        let http = HttpClient::new(&self.config)?.with_dispatch(self.dispatch.clone());
        Ok(V0Client::with_http(http))
    }
}

/// A top-level `etosctl` command
#[async_trait]
pub trait CliCommand: Send + Sync {
    /// Name the command is invoked by
    fn name(&self) -> &'static str;

    /// Argument definition, named after [`CliCommand::name`]
    fn command(&self) -> Command;

    /// Run the command and return the process exit status
    async fn run(&self, matches: &ArgMatches, ctx: &AppContext) -> CliResult<u8>;
}

/// Ordered table of top-level commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Box<dyn CliCommand>>,
    rejected: Vec<&'static str>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command; a name that is already taken keeps its first handler
    pub fn register(&mut self, command: Box<dyn CliCommand>) -> bool {
        let name = command.name();
        if self.get(name).is_some() {
            self.rejected.push(name);
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn get(&self, name: &str) -> Option<&dyn CliCommand> {
        self.commands
            .iter()
            .find(|command| command.name() == name)
            .map(|command| command.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|command| command.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names whose registration was refused
    pub fn rejected(&self) -> &[&'static str] {
        &self.rejected
    }

    /// Log a warning for each refused registration
    pub fn report_rejected(&self) {
        for name in &self.rejected {
            tracing::warn!("Command {} is already registered, ignoring duplicate", name);
        }
    }

    /// Attach every registered command to `root`
    pub fn build_cli(&self, root: Command) -> Command {
        self.commands
            .iter()
            .fold(root, |root, command| root.subcommand(command.command().name(command.name())))
    }

    /// Run the command selected in `matches`
    pub async fn dispatch(&self, matches: &ArgMatches, ctx: &AppContext) -> CliResult<u8> {
        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(CliError::UnknownCommand(String::new()));
        };
        let command = self
            .get(name)
            .ok_or_else(|| CliError::UnknownCommand(name.to_string()))?;
        tracing::debug!("Running command {}", name);
        command.run(sub_matches, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Arg;

    struct Echo {
        name: &'static str,
        code: u8,
    }

    #[async_trait]
    impl CliCommand for Echo {
        fn name(&self) -> &'static str {
            self.name
        }

        fn command(&self) -> Command {
            Command::new(self.name).arg(Arg::new("value").long("value"))
        }

        async fn run(&self, _matches: &ArgMatches, _ctx: &AppContext) -> CliResult<u8> {
            Ok(self.code)
        }
    }

    fn context() -> AppContext {
        AppContext::new(ClientConfig::default(), Dispatch::none())
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(Box::new(Echo { name: "echo", code: 0 })));
        assert!(!registry.register(Box::new(Echo { name: "echo", code: 3 })));
        assert!(registry.register(Box::new(Echo { name: "other", code: 0 })));

        assert_eq!(registry.names(), vec!["echo", "other"]);
        assert_eq!(registry.rejected(), &["echo"]);
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_first_handler() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo { name: "echo", code: 4 }));
        registry.register(Box::new(Echo { name: "echo", code: 5 }));

        let cli = registry.build_cli(Command::new("etosctl"));
        let matches = cli.try_get_matches_from(["etosctl", "echo", "--value", "x"]).unwrap();
        let code = registry.dispatch(&matches, &context()).await.unwrap();
        assert_eq!(code, 4);
    }

    #[tokio::test]
    async fn test_dispatch_without_subcommand_fails() {
        let registry = CommandRegistry::new();
        let matches = Command::new("etosctl").try_get_matches_from(["etosctl"]).unwrap();
        let err = registry.dispatch(&matches, &context()).await.unwrap_err();
        assert!(matches!(err, CliError::UnknownCommand(_)));
    }

    #[test]
    fn test_v0_client_needs_server_url() {
        assert!(context().v0_client().is_err());
    }
}
