//! Command line errors

use etos_client::ClientError;
use etos_core::EtosError;
use thiserror::Error;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Etos(#[from] EtosError),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid arguments: {0}")]
    Arguments(#[from] clap::Error),

    #[error("failed to parse dataset: {0}")]
    Dataset(serde_json::Error),

    #[error("either --repository or --events-file is required")]
    NoEventSource,
}
