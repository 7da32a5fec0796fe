use anyhow::Result;
use clap::Args;
use dbhandle::{DatabaseManager, QueryResult};
use rusqlite::types::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Arguments for the Exec command
#[derive(Args)]
pub struct ExecArgs {
    /// SQL statement to execute
    #[clap(value_name = "SQL")]
    pub sql: String,

    /// Output as JSON
    #[clap(long)]
    pub json: bool,

    /// Pretty-print JSON output
    #[clap(long)]
    pub pretty: bool,
}

pub fn run(manager: &DatabaseManager, args: ExecArgs) -> Result<()> {
    let result = manager.execute_raw(&args.sql, [])?;

    if args.json || args.pretty {
        let json = result.to_json();
        if args.pretty {
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!("{}", json);
        }
        return Ok(());
    }

    if result.columns.is_empty() {
        println!("{} row(s) affected", result.rows_affected);
    } else {
        print_table(&result);
    }
    Ok(())
}

fn print_table(result: &QueryResult) {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(value_to_string));
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
