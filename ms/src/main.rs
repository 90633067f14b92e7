use clap::Parser;
use eyre::{Context, Result};
use log::info;

use memstore::cli::{Cli, Command};
use memstore::{MemoryStore, format_listing};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let store = MemoryStore::open(&cli.root);

    info!("memstore using {}", store.path().display());

    match cli.command {
        Command::Set { key, value } => {
            store.set(&key, &value)?;
            println!("Stored '{}' ({} chars)", key, value.chars().count());
        }
        Command::Get { key } => match store.get(&key)? {
            Some(record) => println!("{}", record.value),
            None => println!("(not found)"),
        },
        Command::List => {
            let entries = store.list()?;
            println!("{}", format_listing(&entries));
        }
        Command::Delete { key } => {
            if store.delete(&key)? {
                println!("Deleted '{}'", key);
            } else {
                println!("Key '{}' not found", key);
            }
        }
        Command::Append { key, value, separator } => {
            let record = store.append(&key, &value, &separator)?;
            println!("Appended to '{}' (now {} chars)", key, record.value.chars().count());
        }
        Command::Clear => {
            let count = store.clear()?;
            println!("Cleared {} entries", count);
        }
    }

    Ok(())
}
