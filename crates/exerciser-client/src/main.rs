//! exerciser CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use exerciser_client::cli::{Cli, Command, ConfigAction};
use exerciser_client::commands;
use exerciser_client::config::ClientConfig;
use exerciser_client::error::{ClientError, ClientResult};
use exerciser_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)
}

async fn run(command: Command, config: ClientConfig) -> ClientResult<()> {
    match command {
        Command::Keys => commands::codec::keys(),
        Command::Encode { key, values } => commands::codec::encode(&key, &values),
        Command::Decode { json } => commands::codec::decode(&json),
        Command::Demo {
            key,
            trace_messages,
        } => commands::demo::run(&config, &key, trace_messages).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
