//! etosctl binary

use std::process::ExitCode;

use etos_client::ClientConfig;
use etosctl::{logging, AppContext};

fn main() -> ExitCode {
    let registry = etosctl::default_registry();
    let matches = registry.build_cli(etosctl::root_command()).get_matches();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr, command output to stdout
    let dispatch = logging::build_dispatch(
        matches.get_flag("verbose"),
        matches.get_flag("debug"),
        &config.log.level,
    );
    let _guard = tracing::dispatcher::set_default(&dispatch);
    registry.report_rejected();
    tracing::debug!("etosctl v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = AppContext::new(config, dispatch);
    match runtime.block_on(registry.dispatch(&matches, &ctx)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
