use anyhow::Result;
use clap::Args;
use dbhandle::{format_size, get_storage_info, DatabaseManager, DbConfig, SchemaStatus};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

pub fn run(config: &DbConfig, manager: &DatabaseManager, args: StatusArgs) -> Result<()> {
    let info = get_storage_info(config, manager.path());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", config.summary());
    println!();
    println!("Storage Name:       {}", manager.name());
    println!("Storage Path:       {}", info.path);
    println!("Exists:             {}", info.exists);
    if let Some(size) = info.size_bytes {
        println!("Size:               {}", format_size(size));
    }
    if let Some(modified) = &info.last_modified {
        println!("Last Modified:      {}", modified);
    }

    let handle = manager.handle();
    println!("Pool Capacity:      {}", handle.max_size());
    println!("Open Sessions:      {}", handle.open_sessions());
    println!("Idle Connections:   {}", handle.idle_connections());
    println!("Statement Logging:  {}", manager.echo());

    if info.exists {
        let schema = match manager.schema_status()? {
            SchemaStatus::Current => "current".to_string(),
            SchemaStatus::NotInitialized => "not initialized".to_string(),
            SchemaStatus::Partial { missing } => format!("missing {}", missing.join(", ")),
        };
        println!("Schema:             {}", schema);
    }
    Ok(())
}
