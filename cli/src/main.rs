use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use fuelwatch::{load_env_from_project_path, log_level_from_verbosity, setup_logger};

use crate::{
    cli_interface::{Commands, CLI},
    commands::{
        init::handle_init_command, prices::handle_prices_command, scrape::handle_scrape_command,
        stations::handle_stations_command,
    },
    console::print_error_message,
};

mod cli_interface;
mod commands;
mod console;
mod fuelwatch_yaml;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CLI::parse();
    setup_logger(log_level_from_verbosity(cli.verbose));

    match &cli.command {
        Commands::Init { path } => {
            let resolved_path = resolve_path(path).map_err(|e| {
                print_error_message(&e);
                e
            })?;
            load_env_from_project_path(&resolved_path);
            handle_init_command(&resolved_path).await
        }
        Commands::Stations { subcommand, path } => {
            let resolved_path = resolve_path(path).map_err(|e| {
                print_error_message(&e);
                e
            })?;
            load_env_from_project_path(&resolved_path);
            handle_stations_command(&resolved_path, subcommand).await
        }
        Commands::Scrape { path } => {
            let resolved_path = resolve_path(path).map_err(|e| {
                print_error_message(&e);
                e
            })?;
            load_env_from_project_path(&resolved_path);
            handle_scrape_command(&resolved_path).await
        }
        Commands::Prices { subcommand, path } => {
            let resolved_path = resolve_path(path).map_err(|e| {
                print_error_message(&e);
                e
            })?;
            load_env_from_project_path(&resolved_path);
            handle_prices_command(&resolved_path, subcommand).await
        }
    }
}

fn resolve_path(override_path: &Option<String>) -> Result<PathBuf, String> {
    match override_path {
        Some(path) => {
            let path = PathBuf::from_str(path).map_err(|_| "Invalid path provided.".to_string())?;
            Ok(path)
        }
        None => {
            Ok(std::env::current_dir()
                .map_err(|_| "Failed to get current directory.".to_string())?)
        }
    }
}
