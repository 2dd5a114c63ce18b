// ABOUTME: Entry point for the shipyard CLI application.
// ABOUTME: Parses arguments, initializes tracing, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RolloutCommand};
use shipyard::config::{self, Config};
use shipyard::error::Result;
use shipyard::output::Output;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output_mode());
    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match cli.command {
        Commands::Init { hosts, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, &hosts, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Render(args) => commands::render(&args, output),
        Commands::Inspect { unit } => commands::inspect(&unit, output),
        Commands::PatchImage {
            unit,
            image,
            in_place,
        } => commands::patch_image(&unit, &image, in_place, output),
        Commands::Validate { unit } => commands::validate(&unit, output),
        Commands::Migrate => commands::migrate(&discover()?, output).await,
        Commands::Tasks { status } => commands::list_tasks(&discover()?, status, output).await,
        Commands::Rollout { command } => {
            let config = discover()?;
            match command {
                RolloutCommand::Create(args) => {
                    commands::create_rollout(&config, &args, output).await
                }
                RolloutCommand::Show { id } => commands::show_rollout(&config, &id, output).await,
                RolloutCommand::List { app } => {
                    commands::list_rollouts(&config, &app, output).await
                }
            }
        }
    }
}

fn discover() -> Result<Config> {
    let cwd = env::current_dir()?;
    Config::discover(&cwd)
}
