// CLI commands and configuration

use crate::board::message::SortOrder;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8140;

/// microboard command line
#[derive(Debug, Parser)]
#[command(name = "microboard", version)]
#[command(about = "A tiny public message board: 140 characters, no accounts")]
pub struct MicroboardCli {
    /// Directory holding the message table (created if missing)
    #[arg(long, global = true, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: MicroboardCommand,
}

/// microboard subcommands
#[derive(Debug, Subcommand)]
pub enum MicroboardCommand {
    /// Serve the message board over HTTP
    Serve {
        /// Address to bind
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Admin key required to delete messages
        #[arg(long, env = "ADMIN_KEY", hide_env_values = true, conflicts_with = "admin_key_sha256")]
        admin_key: Option<String>,

        /// Hex SHA-256 digest of the admin key, instead of the key itself
        #[arg(long, env = "ADMIN_KEY_SHA256", hide_env_values = true)]
        admin_key_sha256: Option<String>,
    },

    /// Print a page of messages as JSON
    List {
        /// Maximum number of messages
        #[arg(short, long, default_value_t = 50, allow_negative_numbers = true)]
        limit: i64,

        /// Number of messages to skip
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,

        /// 'desc' (newest first) or 'asc' (oldest first)
        #[arg(short, long, default_value = "desc")]
        sort: SortOrder,
    },

    /// Print message statistics as JSON
    Stats,

    /// Delete a message (local administration, no key needed)
    Delete {
        /// Message id
        id: String,
    },
}
