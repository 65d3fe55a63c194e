use clap::Parser;
use fitpal::cli::{execute_command, get_log_level, Cli};
use fitpal::config::ConfigLoader;
use fitpal::error::FitpalError;
use fitpal::storage::StorageError;
use tracing::{debug, error, trace};

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<FitpalError>() {
        e.exit_code()
    } else if err.downcast_ref::<StorageError>().is_some() {
        4
    } else {
        1
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::new(cli.config.clone()).load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(e.exit_code());
        }
    };

    let log_level = match (cli.verbose, config.log_level.as_deref()) {
        (0, Some(level)) => level.to_string(),
        (verbose, _) => get_log_level(verbose).to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("fitpal started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = execute_command(cli.command, config, cli.json).await {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<FitpalError>() {
            Some(fitpal_error) => eprintln!("Error: {}", fitpal_error.user_message()),
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(exit_code(&e));
    }
}
