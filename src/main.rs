use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod build;
mod commands;
mod config;
mod util;

#[derive(Parser)]
struct Args {
    /// The command to execute
    #[command(subcommand)]
    command: DocpressCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct BuildArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "docpress.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
struct RenderArgs {
    /// The document to render, relative to its documents directory
    document: String,

    /// The path to the configuration file
    #[arg(short, long, default_value = "docpress.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
struct RunArgs {
    /// Action bundles to run in order, e.g. `"load render" write`
    #[arg(required = true)]
    actions: Vec<String>,

    /// Limit the actions to these document paths
    #[arg(short, long)]
    paths: Vec<String>,

    /// Report what would be written without touching the output
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = "docpress.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
struct CleanArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "docpress.yaml")]
    config_file: Option<PathBuf>,

    /// Only print what would be deleted
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum DocpressCommand {
    /// Initialize a new docpress project
    Init(InitArgs),

    /// Generate the whole site
    Build(BuildArgs),

    /// Render a single document and print it
    Render(RenderArgs),

    /// Run site actions by name
    Run(RunArgs),

    /// Remove the generated site
    Clean(CleanArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "docpress=info".into()))
        .with(fmt::layer())
        .init();

    let args = Args::parse();

    match args.command {
        DocpressCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        DocpressCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        DocpressCommand::Render(args) => {
            commands::render::run(&args).await?;
        }
        DocpressCommand::Run(args) => {
            commands::run::run(&args).await?;
        }
        DocpressCommand::Clean(args) => {
            commands::clean::run(&args).await?;
        }
    }

    Ok(())
}
