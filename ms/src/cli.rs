//! CLI argument parsing for memstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ms")]
#[command(author, version, about = "Inspect and edit an agent working root's memory", long_about = None)]
pub struct Cli {
    /// Working root whose memory file is used
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a value
    Set {
        #[arg(required = true)]
        key: String,

        #[arg(required = true)]
        value: String,
    },

    /// Print a value
    Get {
        #[arg(required = true)]
        key: String,
    },

    /// List all keys with size and last update
    List,

    /// Remove a key
    Delete {
        #[arg(required = true)]
        key: String,
    },

    /// Append to a value, creating it if missing
    Append {
        #[arg(required = true)]
        key: String,

        #[arg(required = true)]
        value: String,

        /// Separator placed between the old and new text
        #[arg(short, long, default_value = crate::DEFAULT_SEPARATOR)]
        separator: String,
    },

    /// Remove every key and the memory file
    Clear,
}
