use tgdl_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Falls back to stderr when the state directory is unusable.
    let target = logging::init();
    tracing::debug!(?target, "logging initialized");

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("tgdl error: {:#}", err);
        std::process::exit(1);
    }
}
