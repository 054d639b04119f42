mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "formport",
    about = "Convert legacy WinForms entities into ASP.NET Core MVC sources, one resumable step at a time",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from formport.json or .git/)
    #[arg(long, global = true, env = "FORMPORT_ROOT")]
    root: Option<PathBuf>,

    /// Read project config from this file instead of {root}/formport.json
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold formport.json and the project directories
    Init,

    /// Run the conversion pipeline for one entity
    Run(cmd::run::RunArgs),

    /// Show conversion state for one entity, or for all of them
    Status(cmd::status::StatusArgs),

    /// Copy generated files into the target projects
    Deploy(cmd::deploy::DeployArgs),

    /// Fold generated members into already-deployed C# sources
    Merge(cmd::merge::MergeArgs),

    /// Restore merged files from their backups
    Rollback(cmd::rollback::RollbackArgs),

    /// List the pipeline steps, their inputs and their outputs
    Steps,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run(args) => cmd::run::run(&root, config, args, cli.json),
        Commands::Status(args) => cmd::status::run(&root, config, args, cli.json),
        Commands::Deploy(args) => cmd::deploy::run(&root, config, args, cli.json),
        Commands::Merge(args) => cmd::merge::run(&root, config, args, cli.json),
        Commands::Rollback(args) => cmd::rollback::run(&root, config, args, cli.json),
        Commands::Steps => cmd::steps::run(cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
