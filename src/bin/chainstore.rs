#![forbid(unsafe_code)]
//! Inspect and feed the local block store from the command line

use chainstore::config::load_config;
use chainstore::ingest::{ingest, RpcBlock};
use chainstore::persistence::{Database, DEFAULT_QUERY_LIMIT};
use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

#[derive(Parser)]
#[command(name = "chainstore", version, about = "Local block store inspector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored blocks
    Blocks {
        #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: u32,
    },
    /// List stored transactions
    Transactions {
        #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: u32,
    },
    /// Show the highest synced block
    LastSync,
    /// Ingest a JSON-RPC block payload from a file
    Ingest { file: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config()?;

    // Ensure the data directory (parent of the DB path) exists
    let db_path = std::path::Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
        }
    }

    let db = Database::open(&config.database.path)?;

    match cli.command {
        Command::Blocks { limit } => {
            let blocks = db.get_blocks(limit)?;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Number", "Hash"]);
            for block in &blocks {
                table.add_row(vec![block.number.to_string(), block.hash.clone()]);
            }
            println!("{table}");
            println!("{}", format!("{} block(s)", blocks.len()).bright_cyan());
        }
        Command::Transactions { limit } => {
            let transactions = db.get_transactions(limit)?;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Hash", "Block"]);
            for tx in &transactions {
                table.add_row(vec![tx.hash.clone(), tx.block_number.to_string()]);
            }
            println!("{table}");
            println!(
                "{}",
                format!("{} transaction(s)", transactions.len()).bright_cyan()
            );
        }
        Command::LastSync => match db.get_last_sync()? {
            Some(last) => {
                println!(
                    "{}",
                    format!("Synced up to block {} ({})", last.block.number, last.block.hash)
                        .bright_green()
                );
            }
            None => {
                println!("{}", "Store is empty - nothing synced yet".yellow());
            }
        },
        Command::Ingest { file } => {
            let payload = std::fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read {}: {}", file, e))?;
            let rpc: RpcBlock = serde_json::from_str(&payload)
                .map_err(|e| format!("Failed to parse {}: {}", file, e))?;
            ingest(&rpc, &db)?;
            println!(
                "{}",
                format!(
                    "Ingested block {} with {} transaction(s)",
                    rpc.number,
                    rpc.transactions.len()
                )
                .bright_green()
            );
        }
    }

    db.close()?;
    Ok(())
}
