use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use log::debug;
use saver_core::config::{get_default_config_file, APP_NAME};
use saver_core::SaverConfig;
use std::process::ExitCode;

mod app;
mod cli;
mod commands;
mod logging;
mod output;

use crate::app::{run_history, App};
use crate::cli::{Cli, Command, HistoryCommand};

/// Loads the config file and layers environment and flags on top
fn load_config(cli: &Cli) -> Result<SaverConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME)?,
    };
    let config = SaverConfig::load_layered(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let overrides = SaverConfig {
        api_key: cli.api_key.clone(),
        ..SaverConfig::default()
    };
    Ok(config.merge(&overrides))
}

fn connect(config: SaverConfig) -> Result<App> {
    App::connect(config).context("Failed to initialize the API client")
}

async fn run(cli: Cli, config: SaverConfig) -> Result<()> {
    match cli.command {
        Command::Send(args) => connect(config)?.run_send(args).await,
        Command::Chat(args) => connect(config)?.run_chat(args).await,
        Command::Models => connect(config)?.run_models().await,
        Command::History(HistoryCommand::Remote { response_id }) => {
            connect(config)?.run_remote(&response_id).await
        }
        Command::History(HistoryCommand::Local(command)) => run_history(&config, &command),
        Command::Conversation(command) => connect(config)?.run_conversation(command).await,
    }
}

fn report(err: &anyhow::Error) {
    debug!("{:?}", err);
    output::print_failure(err);
}

#[tokio::main]
async fn main() -> ExitCode {
    // A .env next to the invocation may carry OPENAI_API_KEY
    dotenv().ok();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(logging::level_from_config(
        config.log_level.as_deref(),
        cli.verbose,
    ));
    debug!("Using model {} at {}", config.model(), config.base_url());

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
