use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dbhandle::{get_instance_with, DbConfig, TableRegistry};
use tracing::Level;

mod commands;

use commands::exec::ExecArgs;
use commands::schema::DropArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.dbhandle/dbhandle.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Database file name under the data directory, must end with .db
    #[clap(short, long)]
    name: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and all declared tables
    Init,

    /// Drop all declared tables
    Drop(DropArgs),

    /// Execute a raw SQL statement in its own committed transaction
    Exec(ExecArgs),

    /// Show the storage location and connection settings
    Status(StatusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match DbConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let manager = match get_instance_with(
        &config,
        cli.name.as_deref(),
        Arc::new(TableRegistry::default()),
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Init => commands::schema::run_init(&manager),
        Commands::Drop(args) => commands::schema::run_drop(&manager, args),
        Commands::Exec(args) => commands::exec::run(&manager, args),
        Commands::Status(args) => commands::status::run(&config, &manager, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
