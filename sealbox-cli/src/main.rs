mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sealbox_core::RecordKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sealbox CLI - encrypted secrets with an offline cache
#[derive(Parser)]
#[command(name = "sealbox", version)]
#[command(about = "Encrypted secret vault with offline cache and sync", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Account to act as
    #[arg(short, long, global = true, env = "SEALBOX_USER")]
    pub user: Option<String>,

    /// Account password (prompted when unset)
    #[arg(long, global = true, env = "SEALBOX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Do not contact the server after a local change
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account on the server and on this device
    Register {
        login: String,
    },

    /// Authenticate with the server, set up this device and sync
    Login {
        login: String,
    },

    /// Add or update a payment card
    AddCard {
        #[arg(long)]
        number: String,
        /// Expiry date
        #[arg(long)]
        date: String,
        /// Security code
        #[arg(long)]
        code: String,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Add or update a login/password pair
    AddLogin {
        /// Site or service name
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        login: String,
        /// Secret to store (prompted when unset)
        #[arg(long)]
        secret: Option<String>,
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Add or update a text note
    AddText {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Add or update a file
    AddBinary {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Show a card
    GetCard {
        number: String,
    },

    /// Show a login/password pair
    GetLogin {
        prompt: String,
        login: String,
    },

    /// Show a text note
    GetText {
        prompt: String,
    },

    /// Write a stored file to disk, or report its size
    GetBinary {
        prompt: String,
        /// Destination file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List stored records
    List {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Exchange changes with the server
    Sync,

    /// Overwrite the server copy of a record with this device's copy
    ForcePush {
        #[arg(value_enum)]
        kind: KindArg,
        /// Plaintext key: number, prompt, or prompt and login
        #[arg(required = true, num_args = 1..=2)]
        key: Vec<String>,
    },

    /// Overwrite this device's copy of a record with the server copy
    ForcePull {
        #[arg(value_enum)]
        kind: KindArg,
        /// Plaintext key: number, prompt, or prompt and login
        #[arg(required = true, num_args = 1..=2)]
        key: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Card,
    Login,
    Text,
    Binary,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Card => RecordKind::Card,
            KindArg::Login => RecordKind::Login,
            KindArg::Text => RecordKind::Text,
            KindArg::Binary => RecordKind::Binary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::run(cli).await
}
