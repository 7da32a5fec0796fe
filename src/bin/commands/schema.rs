use anyhow::{anyhow, Result};
use clap::Args;
use dbhandle::DatabaseManager;
use std::io::Write;

/// Arguments for the Drop command
#[derive(Args)]
pub struct DropArgs {
    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run_init(manager: &DatabaseManager) -> Result<()> {
    manager.create_schema()?;
    // make sure the file exists even when no tables are declared
    manager.execute_raw("SELECT 1", [])?;
    println!("Database initialized successfully!");
    println!("  {}", manager.path().display());
    Ok(())
}

pub fn run_drop(manager: &DatabaseManager, args: DropArgs) -> Result<()> {
    if !args.yes {
        print!(
            "Drop all declared tables in {}? [y/N] ",
            manager.path().display()
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(|e| anyhow!("Failed to read confirmation: {}", e))?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    manager.drop_schema()?;
    println!("Dropped all declared tables.");
    Ok(())
}
