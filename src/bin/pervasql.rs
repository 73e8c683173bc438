//! pervasql: compile criteria objects to SQL from the command line.
//!
//! # Usage
//!
//! ```bash
//! # SELECT from a collection (table name resolved through the config)
//! pervasql select user '{"where":{"name":"Bob"},"limit":10}'
//!
//! # INSERT
//! pervasql insert user '{"name":"Bob","age":30}'
//!
//! # Column list for every configured attribute
//! pervasql schema user
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use pervasive_sql::config::Config;
use pervasive_sql::prelude::*;
use pervasive_sql::value::value_map_from_json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pervasql")]
#[command(version)]
#[command(about = "Compile MongoDB-style criteria into Pervasive / SQL Server SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    pervasql select user '{\"where\":{\"age\":{\">\":21}}}'
    pervasql insert user '{\"name\":\"Bob\"}'
    echo '{\"sum\":\"amount\",\"groupBy\":\"region\"}' | pervasql select sale -")]
struct Cli {
    /// Configuration file (defaults to <config dir>/pervasql/config.toml)
    #[arg(short, long, global = true, env = "PERVASQL_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a SELECT from a criteria object
    Select {
        collection: String,
        /// Criteria JSON, or `-` for stdin
        #[arg(default_value = "{}")]
        criteria: String,
    },
    /// Compile an INSERT from a values object
    Insert {
        collection: String,
        /// Values JSON, or `-` for stdin
        values: String,
    },
    /// Column definitions for a configured collection
    Schema { collection: String },
    /// ALTER TABLE ... ADD for one attribute
    AddColumn {
        collection: String,
        name: String,
        /// Column definition JSON, e.g. '{"type":"string","unique":true}'
        definition: String,
    },
    /// ALTER TABLE ... DROP COLUMN
    DropColumn { collection: String, name: String },
    /// Equality criteria matching a values object
    UpdateCriteria {
        collection: String,
        /// Values JSON, or `-` for stdin
        values: String,
    },
    /// Escape a JSON literal, or an identifier with --identifier
    Escape {
        value: String,
        #[arg(short, long)]
        identifier: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pervasive_sql=debug" } else { "pervasive_sql=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let registry = config.registry();

    if cli.verbose {
        if !registry.is_empty() {
            eprintln!("{} {} collection(s)", "Config:".dimmed(), registry.len());
        }
        if let Some(conn) = config.connection.redacted() {
            eprintln!("{} {}", "Connection:".dimmed(), conn);
        }
    }

    let sql = match &cli.command {
        Commands::Select { collection, criteria } => {
            let criteria = Criteria::from_json(&read_json(criteria)?)?;
            build_select(registry.table_for(collection), &criteria)?
        }
        Commands::Insert { collection, values } => {
            let values = value_map_from_json(&read_json(values)?)?;
            build_insert(registry.table_for(collection), &values)
        }
        Commands::Schema { collection } => {
            let collection = registry.get(collection)?;
            build_schema(collection.table(), &collection.attributes)
        }
        Commands::AddColumn { collection, name, definition } => {
            let def: ColumnDef =
                serde_json::from_str(definition).context("parsing column definition")?;
            build_add_column(registry.table_for(collection), name, &def)
        }
        Commands::DropColumn { collection, name } => {
            build_drop_column(registry.table_for(collection), name)
        }
        Commands::UpdateCriteria { collection, values } => {
            let values = value_map_from_json(&read_json(values)?)?;
            build_update_criteria(registry.table_for(collection), &values)
        }
        Commands::Escape { value, identifier } => {
            if *identifier {
                escape_identifier(value)
            } else {
                let json = serde_json::from_str(value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
                escape_value(&Value::from_json(&json))
            }
        }
    };

    if cli.verbose {
        println!("{}", "Generated SQL:".green().bold());
    }
    println!("{}", sql);
    Ok(())
}

/// Parse a JSON argument, reading stdin for `-`.
fn read_json(arg: &str) -> anyhow::Result<serde_json::Value> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        buf
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).context("parsing JSON argument")
}
